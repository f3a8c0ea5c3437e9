//! Benchmarks for TDS 5.0 packet and package encoding and decoding.

#![allow(clippy::unwrap_used, missing_docs)]

use std::hint::black_box;

use ase_protocol::{
    FieldData, FieldFmt, MessageType, Package, PacketHeader, PacketQueue, PacketSize,
    PacketStatus,
    package::{FormatKind, FormatPackage, LanguagePackage},
};
use ase_types::{DataType, Endian, SqlValue};
use bytes::BytesMut;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};

fn bench_packet_header(c: &mut Criterion) {
    let header = PacketHeader::new(MessageType::Lang, PacketStatus::EOM, 512);
    let encoded = header.encode_to_bytes();

    c.bench_function("packet_header_encode", |b| {
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(8);
            header.encode(&mut buf);
            black_box(buf)
        })
    });

    c.bench_function("packet_header_decode", |b| {
        b.iter(|| {
            let mut cursor = encoded.clone();
            black_box(PacketHeader::decode(&mut cursor).unwrap())
        })
    });
}

/// Write a large language command and read it back across packets.
fn bench_queue_spanning(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_spanning");
    let command = "select * from sysobjects where name like 'sys%' ".repeat(200);
    group.throughput(Throughput::Bytes(command.len() as u64));

    for size in [512usize, 4096] {
        group.bench_function(format!("packet_size_{size}"), |b| {
            b.iter(|| {
                let mut out = PacketQueue::new(PacketSize::new(size), Endian::Little);
                Package::Language(LanguagePackage::new(command.as_str()))
                    .encode(&mut out)
                    .unwrap();

                let mut inbound = PacketQueue::new(PacketSize::new(size), Endian::Little);
                for packet in out.take_packets(true) {
                    inbound.add_packet(packet);
                }
                black_box(Package::decode(&mut inbound, None).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_row_decode(c: &mut Criterion) {
    let row_fmt = FormatPackage::new(
        FormatKind::Row,
        false,
        vec![
            FieldFmt::new(DataType::Int4).with_name("id"),
            FieldFmt::new(DataType::VarChar).with_name("name"),
            FieldFmt::new(DataType::Flt8).with_name("weight"),
        ],
    );
    let row = Package::Row(row_fmt.data(vec![
        FieldData::new(42),
        FieldData::new("forty-two"),
        FieldData::new(SqlValue::Double(42.5)),
    ]));
    let preceding = Package::RowFmt(row_fmt);

    let mut queue = PacketQueue::new(PacketSize::default(), Endian::Little);
    for _ in 0..100 {
        row.encode(&mut queue).unwrap();
    }
    let packets = queue.take_packets(true);

    c.bench_function("row_decode_100", |b| {
        b.iter(|| {
            let mut inbound = PacketQueue::new(PacketSize::default(), Endian::Little);
            for packet in packets.iter().cloned() {
                inbound.add_packet(packet);
            }
            let mut last = preceding.clone();
            while !inbound.is_eom() {
                last = Package::decode(&mut inbound, Some(&last)).unwrap();
            }
            black_box(last)
        })
    });
}

criterion_group!(benches, bench_packet_header, bench_queue_spanning, bench_row_decode);
criterion_main!(benches);
