use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ip_extract::{is_bogon_str, Ledger, Matcher};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Firewall-style log lines. Roughly half the peers are RFC 1918 or
/// loopback, some IPv6 peers carry zone indexes or embedded IPv4, and
/// every line has colon-heavy timestamps that look almost like IPv6.
fn firewall_log(lines: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = String::new();
    for i in 0..lines {
        let src = match rng.gen_range(0..4) {
            0 => format!("10.{}.{}.{}", rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>()),
            1 => format!("192.168.{}.{}", rng.gen::<u8>(), rng.gen::<u8>()),
            2 => format!("fe80::{:x}:{:x}%eth{}", rng.gen::<u16>(), rng.gen::<u16>(), i % 4),
            _ => format!("64:ff9b::{}.{}.{}.{}", rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>()),
        };
        // Public destinations repeat so the ledger sees real counting.
        let dst = format!("{}.{}.{}.{}", 1 + i % 200, 8, 8, 1 + i % 7);
        out.push_str(&format!(
            "2024-03-0{} 12:{:02}:{:02} fw01 kernel: DROP IN=eth0 SRC={} DST={} PROTO=TCP SPT={} DPT=443\n",
            1 + i % 9,
            i % 60,
            (i * 7) % 60,
            src,
            dst,
            rng.gen_range(1024..65535u16),
        ));
    }
    out.into_bytes()
}

/// Prose with `::` separators and scope operators but no addresses.
fn colon_noise(lines: usize) -> Vec<u8> {
    let mut out = String::new();
    for i in 0..lines {
        out.push_str(&format!(
            "at crate::module{i}::handler :: step {i} of std::vec::Vec<u8> at 09:{:02}\n",
            i % 60
        ));
    }
    out.into_bytes()
}

fn bench_extraction(c: &mut Criterion) {
    let matcher = Matcher::shared();
    let mut group = c.benchmark_group("extraction");

    let logs = firewall_log(2_000, 7);
    let noise = colon_noise(2_000);
    for (name, input) in [("firewall_log", &logs), ("colon_noise", &noise)] {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("find_iter", name), input, |b, input| {
            b.iter(|| matcher.find_iter(input).count());
        });
    }

    for exclude_bogons in [true, false] {
        let id = if exclude_bogons { "excluding_bogons" } else { "including_bogons" };
        group.throughput(Throughput::Bytes(logs.len() as u64));
        group.bench_with_input(BenchmarkId::new("ledger", id), &logs, |b, input| {
            b.iter(|| {
                let mut ledger = Ledger::new(exclude_bogons);
                ledger.record_bytes(input);
                ledger.len()
            });
        });
    }

    group.finish();
}

fn bench_bogon_check(c: &mut Criterion) {
    let addresses = [
        "8.8.8.8",
        "10.20.30.40",
        "100.64.0.1",
        "169.254.10.10",
        "203.0.113.9",
        "240.0.0.1",
        "127.0.0.01",
        "2001:4860:4860::8888",
        "fe80::1",
        "fc00::abcd",
        "2001:db8::1",
        "::ffff:192.168.0.1",
    ];
    c.bench_function("is_bogon_str", |b| {
        b.iter(|| addresses.iter().filter(|a| is_bogon_str(a)).count());
    });
}

criterion_group!(benches, bench_extraction, bench_bogon_check);
criterion_main!(benches);
