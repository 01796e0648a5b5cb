use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use bloomledger_core::{BranchName, ItemId, OperatorId, OrderId};
use bloomledger_infra::context::{FixedClock, StaticOperator};
use bloomledger_infra::reconciliation::RevenueReconciliationJob;
use bloomledger_infra::stock_tx::{StockChangeRequest, StockTransactionManager};
use bloomledger_infra::store::{InMemoryStore, OrderStore, StockStore};
use bloomledger_inventory::{ChangeType, ItemType, LedgerMetadata, StockKey, StockRow};
use bloomledger_sales::{
    AmountSplit, Order, OrderStatus, OrderSummary, Orderer, Payment, PaymentStatus, TransferInfo,
    TransferStatus,
};
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use std::sync::Arc;

fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

fn day_start() -> DateTime<Utc> {
    kst().with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap().with_timezone(&Utc)
}

fn manager(store: Arc<InMemoryStore>) -> StockTransactionManager<Arc<InMemoryStore>> {
    StockTransactionManager::new(
        store,
        Arc::new(StaticOperator(OperatorId::parse("bench").unwrap())),
        Arc::new(FixedClock(day_start())),
        5,
    )
}

/// Orders spread over one day across `branches` branches, every third one transferred.
fn seed_orders(store: &InMemoryStore, count: usize, branches: usize) {
    for i in 0..count {
        let origin = BranchName::parse(format!("branch-{}", i % branches)).unwrap();
        let process = BranchName::parse(format!("branch-{}", (i + 1) % branches)).unwrap();
        let total = 10_000 + (i as i64 % 7) * 1_350;
        let transfer_info = (i % 3 == 0).then(|| TransferInfo {
            is_transferred: true,
            status: TransferStatus::Completed,
            process_branch_name: Some(process),
            amount_split: Some(AmountSplit::new(70, 30).unwrap()),
        });
        store
            .insert_order(Order {
                id: OrderId::new(),
                order_date: day_start() + Duration::seconds((i as i64 * 37) % 86_400),
                branch_name: origin,
                orderer: Orderer {
                    name: "bench".to_string(),
                    contact: None,
                },
                lines: vec![],
                payment: Payment {
                    method: "card".to_string(),
                    status: if i % 4 == 0 { PaymentStatus::Pending } else { PaymentStatus::Paid },
                },
                summary: OrderSummary {
                    subtotal: total,
                    delivery_fee: 0,
                    total,
                },
                status: if i % 10 == 0 { OrderStatus::Canceled } else { OrderStatus::Completed },
                transfer_info,
                created_by: OperatorId::parse("bench").unwrap(),
            })
            .unwrap();
    }
}

fn bench_stock_change_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("stock_change_latency");
    group.sample_size(1000);

    // Benchmark: stock-in on a row with a growing ledger
    group.bench_function("stock_in", |b| {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_row(StockRow::new(
                ItemId::parse("M1").unwrap(),
                BranchName::parse("A").unwrap(),
                "Red rose",
                ItemType::Material,
                1_500,
            ))
            .unwrap();
        let stm = manager(store);
        let key = StockKey::new(ItemId::parse("M1").unwrap(), BranchName::parse("A").unwrap());

        b.iter(|| {
            stm.apply_stock_change(StockChangeRequest {
                key: key.clone(),
                delta: black_box(5),
                change_type: ChangeType::In,
                metadata: LedgerMetadata::default(),
            })
            .unwrap();
        });
    });

    group.finish();
}

fn bench_reconcile_day(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_day");

    for order_count in [10, 100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*order_count as u64));
        group.bench_with_input(
            BenchmarkId::new("orders", order_count),
            order_count,
            |b, &count| {
                let store = Arc::new(InMemoryStore::new());
                seed_orders(&store, count, 12);
                let job = RevenueReconciliationJob::new(store, kst(), Arc::new(FixedClock(day_start())));

                b.iter(|| {
                    black_box(job.reconcile(black_box("2024-05-01")).unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_stock_change_latency, bench_reconcile_day);
criterion_main!(benches);
