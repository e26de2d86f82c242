use std::hint::black_box;
use std::io::Read;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use fast_iconv::Converter;

const POEM: &str = "花间一壶酒，独酌无相亲。举杯邀明月，对影成三人。";

fn bench_one_shot(c: &mut Criterion) {
    let text = POEM.repeat(4096);
    let gbk = Converter::new("UTF-8", "GBK")
        .unwrap()
        .convert_bytes(text.as_bytes())
        .unwrap();
    let latin1: Vec<u8> = (0..=255u8)
        .filter(|b| !(0x80..0xA0).contains(b))
        .cycle()
        .take(256 * 1024)
        .collect();

    let mut group = c.benchmark_group("one_shot");
    let cases = [
        ("utf8_to_gbk", "UTF-8", "GBK", text.as_bytes()),
        ("gbk_to_utf8", "GBK", "UTF-8", &gbk[..]),
        ("gbk_to_big5", "GBK", "Big5", &gbk[..]),
        ("latin1_to_cp850", "ISO-8859-1", "CP850", &latin1[..]),
        ("utf8_to_koi8r_unmappable", "UTF-8", "KOI8-R", text.as_bytes()),
    ];
    for (name, from, to, input) in cases {
        let converter = Converter::new(from, to).unwrap();
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_function(name, |b| {
            b.iter(|| converter.convert_bytes(black_box(input)).unwrap())
        });
    }
    group.finish();
}

fn bench_stream(c: &mut Criterion) {
    let text = POEM.repeat(4096);
    let converter = Converter::new("UTF-8", "GB-18030").unwrap();

    let mut group = c.benchmark_group("stream");
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("utf8_to_gb18030", |b| {
        b.iter(|| {
            let mut output = Vec::new();
            converter
                .convert_stream(black_box(text.as_bytes()))
                .read_to_end(&mut output)
                .unwrap();
            output
        })
    });
    group.finish();
}

criterion_group!(benches, bench_one_shot, bench_stream);
criterion_main!(benches);
