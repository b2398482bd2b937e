//! Performance benchmarks for abusereport components.
//!
//! Extraction and indexing run over every input line, and the result parser
//! runs over every directory response, so these are the hot paths for large
//! log files.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use abusereport::log_index::LogIndex;
use abusereport::netutil::{self, Address};
use abusereport::parser;

const ARIN_RESPONSE: &str = r#"
NetRange:       203.0.113.0 - 203.0.113.255
CIDR:           203.0.113.0/24
NetName:        EXAMPLE-NET
Organization:   Example Hosting (EXH-1)
RegDate:        2010-01-01
Updated:        2024-09-17

OrgName:        Example Hosting
OrgId:          EXH-1
Address:        1 Example Way
City:           Springfield
Country:        US

OrgAbuseHandle: ABUSE-EXH
OrgAbuseName:   Abuse Department
OrgAbusePhone:  +1-555-0100
OrgAbuseEmail:  abuse@example-hosting.net
"#;

const RIPE_RESPONSE: &str = r#"
% This is the RIPE Database query service.
inetnum:        198.51.100.0 - 198.51.100.255
netname:        EXAMPLE-EU
descr:          Example Networks B.V.
country:        NL
admin-c:        EX1-RIPE
tech-c:         EX1-RIPE
status:         ASSIGNED PA
mnt-by:         EXAMPLE-MNT
abuse-mailbox:  abuse@example-networks.eu
"#;

fn generate_log(lines: usize) -> Vec<String> {
    (0..lines)
        .map(|i| {
            let a = (i % 200) + 1;
            let b = (i / 200) % 250;
            match i % 4 {
                0 => format!(
                    "Sep 17 12:{:02}:{:02} host sshd[{i}]: Failed password for root from 203.0.{b}.{a} port 22 ssh2",
                    (i / 60) % 60,
                    i % 60
                ),
                1 => format!("198.51.100.{a} - - [17/Sep/2024:12:00:00 +0000] \"GET /wp-login.php HTTP/1.1\" 404 153"),
                2 => format!("kernel: [UFW BLOCK] IN=eth0 SRC=2001:db8:{b:x}::{a:x} DST=10.0.0.2 PROTO=TCP"),
                _ => format!("postfix/smtpd[{i}]: connect from unknown[192.168.1.{a}]"),
            }
        })
        .collect()
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    let samples = [
        ("ipv4", "Failed password for root from 203.0.113.5 port 22 ssh2"),
        ("ipv6", "SRC=2001:db8::1 DST=fe80::1%eth0 PROTO=TCP"),
        ("none", "Sep 17 12:34:56 systemd[1]: Started Session 42 of user root."),
    ];
    for (name, line) in samples {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| netutil::extract(black_box(line)))
        });
    }
    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let addrs: Vec<Address> = [
        "10.1.2.3",
        "100.64.0.1",
        "172.31.255.255",
        "203.0.113.5",
        "::1",
        "fd00::1",
        "2001:db8::1",
    ]
    .iter()
    .map(|s| s.parse().unwrap())
    .collect();

    c.bench_function("classify", |b| {
        b.iter(|| {
            for addr in &addrs {
                black_box(netutil::classify(black_box(addr)));
            }
        })
    });
}

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_index_build");
    for size in [100usize, 1_000, 10_000] {
        let lines = generate_log(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &lines, |b, lines| {
            b.iter(|| LogIndex::build(black_box(lines)))
        });
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_whois");
    group.bench_function("arin", |b| b.iter(|| parser::parse(black_box(ARIN_RESPONSE))));
    group.bench_function("ripe", |b| b.iter(|| parser::parse(black_box(RIPE_RESPONSE))));
    group.bench_function("empty", |b| b.iter(|| parser::parse(black_box(""))));
    group.finish();
}

criterion_group!(
    benches,
    bench_extract,
    bench_classify,
    bench_index_build,
    bench_parse
);
criterion_main!(benches);
