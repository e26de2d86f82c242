//! Names of the built-in encodings and their registration
//!
//! Names are matched exactly: no case folding and no alias resolution.

use std::sync::Arc;

use crate::Result;
use crate::hz::HzCodec;
use crate::multibyte::MultiByteCodec;
use crate::registry::RegistryBuilder;
use crate::singlebyte::{SingleByteCodec, TranslationTable};
use crate::tables;
use crate::transform::{Codec, TransformFactory};

/// UTF-8, the canonical form every other encoding is bridged through
pub const UTF8: &str = "UTF-8";
/// GBK (Simplified Chinese)
pub const GBK: &str = "GBK";
/// GB 18030 (Simplified Chinese, full Unicode coverage)
pub const GB18030: &str = "GB-18030";
/// HZ-GB2312 (7-bit Simplified Chinese, RFC 1843)
pub const HZ_GB2312: &str = "HZ-GB2312";
/// Big5 (Traditional Chinese)
pub const BIG5: &str = "Big5";
/// ISO-8859-1 (Latin-1)
pub const ISO_8859_1: &str = "ISO-8859-1";
/// EUC-JP (Japanese)
pub const EUC_JP: &str = "EUC-JP";
/// Shift_JIS (Japanese)
pub const SHIFT_JIS: &str = "Shift_JIS";
/// DOS code page 850 (Western European OEM)
pub const CP850: &str = "CP850";
/// EUC-KR (Korean)
pub const EUC_KR: &str = "EUC-KR";
/// ISO-2022-JP (7-bit Japanese)
pub const ISO_2022_JP: &str = "ISO-2022-JP";
/// Windows-1252 (Western European)
pub const WINDOWS_1252: &str = "Windows-1252";
/// KOI8-R (Russian)
pub const KOI8_R: &str = "KOI8-R";

/// Register every built-in encoding on `builder`
pub(crate) fn register_builtin(builder: &mut RegistryBuilder) -> Result<()> {
    let codecs: [(&str, Arc<dyn Codec>); 12] = [
        (GBK, Arc::new(MultiByteCodec::new(encoding_rs::GBK))),
        (GB18030, Arc::new(MultiByteCodec::new(encoding_rs::GB18030))),
        (HZ_GB2312, Arc::new(HzCodec)),
        (BIG5, Arc::new(MultiByteCodec::new(encoding_rs::BIG5))),
        (ISO_8859_1, Arc::new(SingleByteCodec::new(&tables::LATIN_1))),
        (EUC_JP, Arc::new(MultiByteCodec::new(encoding_rs::EUC_JP))),
        (SHIFT_JIS, Arc::new(MultiByteCodec::new(encoding_rs::SHIFT_JIS))),
        (CP850, Arc::new(SingleByteCodec::new(&tables::CP850))),
        (EUC_KR, Arc::new(MultiByteCodec::new(encoding_rs::EUC_KR))),
        (ISO_2022_JP, Arc::new(MultiByteCodec::new(encoding_rs::ISO_2022_JP))),
        (WINDOWS_1252, Arc::new(MultiByteCodec::new(encoding_rs::WINDOWS_1252))),
        (KOI8_R, Arc::new(MultiByteCodec::new(encoding_rs::KOI8_R))),
    ];
    for (name, codec) in codecs {
        builder.register_codec(name, codec)?;
    }

    // Latin-1 and CP850 convert byte-to-byte without decoding.
    for (from, to, table) in [
        (ISO_8859_1, CP850, TranslationTable::new(&tables::LATIN_1, &tables::CP850)),
        (CP850, ISO_8859_1, TranslationTable::new(&tables::CP850, &tables::LATIN_1)),
    ] {
        let factory = TransformFactory::new(move |mode| Box::new(table.transform(mode)));
        builder.register_direct(from, to, factory)?;
    }
    Ok(())
}
