use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use bookkeep_accounting::{Account, EntryFilter, Journal, Ledger};
use bookkeep_core::{CountingGuidSource, Currency, MonotonicSequence};
use chrono::NaiveDate;

fn pln() -> Currency {
    Currency::new("PLN", "985", 100, "Polish zloty").expect("PLN is valid")
}

fn setup_ledger(journals: usize) -> Ledger {
    let mut ledger = Ledger::with_sources(
        "GL",
        "General Ledger",
        MonotonicSequence::new(),
        CountingGuidSource::default(),
    );
    for (tag, name) in [("110", "Cash"), ("400", "Sales")] {
        ledger
            .register_account(Account::new(tag, name, pln()).unwrap())
            .unwrap();
    }
    for j in 0..journals {
        ledger
            .register_journal(Journal::general(format!("J{j}"), format!("Journal {j}")))
            .unwrap();
    }
    ledger
}

fn post_sales(ledger: &mut Ledger, journals: usize, count: usize) {
    for i in 0..count {
        let date = NaiveDate::from_ymd_opt(2023, 1, 1 + (i % 28) as u32).unwrap();
        let journal = format!("J{}", i % journals);
        let mut entry = ledger.new_entry(&journal, date).unwrap();
        entry.debit("Account", 100 + i as i64, Some("110")).unwrap();
        entry.credit("Account", 100 + i as i64, Some("400")).unwrap();
        ledger.post_entry(&mut entry).unwrap();
    }
}

fn bench_posting(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_entry");
    for count in [100usize, 1_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut ledger = setup_ledger(1);
                post_sales(&mut ledger, 1, count);
                black_box(ledger)
            });
        });
    }
    group.finish();
}

fn bench_merged_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("journal_entries_merge");
    for journals in [1usize, 4, 16] {
        let mut ledger = setup_ledger(journals);
        post_sales(&mut ledger, journals, 2_000);
        group.throughput(Throughput::Elements(2_000));
        group.bench_with_input(BenchmarkId::from_parameter(journals), &ledger, |b, ledger| {
            b.iter(|| black_box(ledger.journal_entries(&EntryFilter::all()).count()));
        });
    }
    group.finish();
}

fn bench_balances(c: &mut Criterion) {
    let mut ledger = setup_ledger(4);
    post_sales(&mut ledger, 4, 2_000);
    c.bench_function("account_balance", |b| {
        b.iter(|| black_box(ledger.account("110").map(|a| a.balance())));
    });
}

criterion_group!(benches, bench_posting, bench_merged_iteration, bench_balances);
criterion_main!(benches);
