use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use bookledger_accounts::RandomHexGenerator;
use bookledger_core::{AccountId, BookId, Money};
use bookledger_infra::{
    BorrowBook, InMemoryLibraryStore, LedgerConfig, Library, ReturnBook,
};
use chrono::{Duration, Utc};
use tokio::runtime::Runtime;

type BenchLibrary = Library<InMemoryLibraryStore>;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime")
}

fn library() -> BenchLibrary {
    Library::new(
        Arc::new(InMemoryLibraryStore::new()),
        &LedgerConfig::default(),
        Arc::new(RandomHexGenerator::default()),
    )
}

async fn seed(library: &BenchLibrary, balance: i64) -> (BookId, AccountId) {
    let book = library
        .books()
        .register("Benchmark", Utc::now())
        .await
        .expect("register book");
    let account = library
        .accounts()
        .create(Money::from_minor(balance), Utc::now())
        .await
        .expect("open account");
    (book.id_typed(), account.id_typed())
}

/// One borrow followed by one return of the same book.
fn bench_borrow_return_cycle(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("borrow_return");
    group.throughput(Throughput::Elements(2));

    group.bench_function("cycle", |b| {
        let library = library();
        let (book_id, account_id) = rt.block_on(seed(&library, i64::MAX / 2));

        b.iter(|| {
            rt.block_on(async {
                let now = Utc::now();
                library
                    .engine()
                    .borrow(BorrowBook {
                        account_id,
                        book_id,
                        occurred_at: now,
                    })
                    .await
                    .expect("borrow");
                let entry = library
                    .engine()
                    .return_book(ReturnBook {
                        account_id,
                        book_id,
                        occurred_at: now,
                    })
                    .await
                    .expect("return");
                black_box(entry);
            })
        });
    });

    group.finish();
}

/// Report and income aggregation as ledger history grows.
fn bench_report_aggregation(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("report_aggregation");

    for cycles in [10usize, 100, 1_000].iter() {
        let library = library();
        let (book_id, account_id) = rt.block_on(seed(&library, i64::MAX / 2));
        let start = Utc::now() - Duration::hours(1);

        rt.block_on(async {
            for i in 0..*cycles {
                let at = start + Duration::milliseconds(i as i64);
                library
                    .engine()
                    .borrow(BorrowBook {
                        account_id,
                        book_id,
                        occurred_at: at,
                    })
                    .await
                    .expect("borrow");
                library
                    .engine()
                    .return_book(ReturnBook {
                        account_id,
                        book_id,
                        occurred_at: at,
                    })
                    .await
                    .expect("return");
            }
        });

        group.throughput(Throughput::Elements((*cycles * 2) as u64));
        group.bench_with_input(BenchmarkId::new("annual_report", cycles), cycles, |b, _| {
            b.iter(|| {
                let report = rt
                    .block_on(library.reports().report_for(account_id, "annual", Utc::now()))
                    .expect("report");
                black_box(report);
            });
        });
        group.bench_with_input(BenchmarkId::new("book_income", cycles), cycles, |b, _| {
            b.iter(|| {
                let income = rt
                    .block_on(library.reports().income_for(
                        book_id,
                        Some(start),
                        None,
                        Utc::now(),
                    ))
                    .expect("income");
                black_box(income);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_borrow_return_cycle, bench_report_aggregation);
criterion_main!(benches);
