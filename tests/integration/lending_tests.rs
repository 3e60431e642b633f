//! End-to-end lending scenarios over the in-memory store

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use libris_server::{
    config::LendingConfig,
    error::AppError,
    models::{Actor, Book, BorrowStatus, ReserveStatus, Role, StockAdjustment, User, UserStatus},
    repository::{LendingStore, MemoryStore},
    services::{clock::ManualClock, Services},
};

struct Harness {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    services: Arc<Services>,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(start()));
    let services = Arc::new(Services::new(
        store.clone(),
        clock.clone(),
        LendingConfig::default(),
    ));
    Harness { store, clock, services }
}

impl Harness {
    async fn book(&self, total: i32) -> Book {
        self.store.insert_book("Dune", total).await
    }

    async fn reader(&self, name: &str) -> User {
        self.store.insert_user(name, Role::Reader).await
    }

    async fn user(&self, id: i32) -> User {
        self.store.get_user(id).await.unwrap().unwrap()
    }

    async fn stock(&self, id: i32) -> Book {
        self.store.get_book(id).await.unwrap().unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_borrows_of_last_copy_admit_exactly_one() {
    let h = harness();
    let book = h.book(1).await;

    let mut readers = Vec::new();
    for i in 0..16 {
        readers.push(h.reader(&format!("reader{}", i)).await);
    }

    let mut tasks = Vec::new();
    for reader in readers {
        let services = h.services.clone();
        tasks.push(tokio::spawn(async move {
            services.borrows.borrow(reader.id, book.id, 14).await
        }));
    }

    let mut ok = 0;
    let mut out_of_stock = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(AppError::OutOfStock(_)) => out_of_stock += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(out_of_stock, 15);
    assert_eq!(h.stock(book.id).await.available_stock, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_borrows_and_returns_keep_stock_consistent() {
    let h = harness();
    let book = h.book(3).await;

    let mut tasks = Vec::new();
    for i in 0..12 {
        let reader = h.reader(&format!("r{}", i)).await;
        let services = h.services.clone();
        tasks.push(tokio::spawn(async move {
            if let Ok(record) = services.borrows.borrow(reader.id, book.id, 7).await {
                tokio::task::yield_now().await;
                services.borrows.return_book(record.id).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let after = h.stock(book.id).await;
    let out = h
        .store
        .borrows()
        .await
        .iter()
        .filter(|r| r.book_id == book.id && r.is_out())
        .count() as i32;
    assert_eq!(after.available_stock + out, after.total_stock);
    assert_eq!(after.available_stock, 3);
}

#[tokio::test]
async fn same_user_cannot_hold_two_copies_of_one_book() {
    let h = harness();
    let book = h.book(2).await;
    let reader = h.reader("ann").await;

    h.services.borrows.borrow(reader.id, book.id, 14).await.unwrap();
    let err = h.services.borrows.borrow(reader.id, book.id, 14).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicateBorrow(_)));
    assert_eq!(h.stock(book.id).await.available_stock, 1);
}

#[tokio::test]
async fn renewals_stop_at_the_limit() {
    let h = harness();
    let book = h.book(1).await;
    let reader = h.reader("ben").await;

    let record = h.services.borrows.borrow(reader.id, book.id, 14).await.unwrap();
    let once = h.services.borrows.renew(record.id, 7).await.unwrap();
    assert_eq!(once.due_date, record.due_date + Duration::days(7));
    let twice = h.services.borrows.renew(record.id, 7).await.unwrap();
    assert_eq!(twice.renew_count, 2);

    let err = h.services.borrows.renew(record.id, 7).await.unwrap_err();
    assert!(matches!(err, AppError::RenewLimitExceeded(_)));

    h.services.borrows.return_book(record.id).await.unwrap();
    let err = h.services.borrows.renew(record.id, 7).await.unwrap_err();
    assert!(matches!(err, AppError::NotRenewable(_)));
}

#[tokio::test]
async fn return_exactly_at_due_instant_is_on_time() {
    let h = harness();
    let book = h.book(1).await;
    let reader = h.reader("cy").await;

    let record = h.services.borrows.borrow(reader.id, book.id, 14).await.unwrap();
    h.clock.set(record.due_date);

    let returned = h.services.borrows.return_book(record.id).await.unwrap();
    assert_eq!(returned.status, BorrowStatus::Returned);
    assert_eq!(returned.fine_amount, Decimal::ZERO);
    assert_eq!(h.user(reader.id).await.credit_score, 100);

    let err = h.services.borrows.return_book(record.id).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyReturned(_)));
    assert_eq!(h.stock(book.id).await.available_stock, 1);
}

#[tokio::test]
async fn one_second_late_costs_a_full_day() {
    let h = harness();
    let book = h.book(1).await;
    let reader = h.reader("dee").await;

    let record = h.services.borrows.borrow(reader.id, book.id, 14).await.unwrap();
    h.clock.set(record.due_date + Duration::seconds(1));

    let returned = h.services.borrows.return_book(record.id).await.unwrap();
    assert_eq!(returned.status, BorrowStatus::Overdue);
    assert_eq!(returned.overdue_days, 1);
    assert_eq!(returned.fine_amount, Decimal::new(5, 1));
    assert_eq!(h.user(reader.id).await.credit_score, 99);
}

#[tokio::test]
async fn fines_cap_at_the_maximum() {
    let h = harness();
    let book = h.book(2).await;
    let forty = h.reader("eve").await;
    let forty_one = h.reader("fay").await;

    let a = h.services.borrows.borrow(forty.id, book.id, 14).await.unwrap();
    let b = h.services.borrows.borrow(forty_one.id, book.id, 14).await.unwrap();

    h.clock.set(a.due_date + Duration::days(40));
    let a = h.services.borrows.return_book(a.id).await.unwrap();
    assert_eq!(a.fine_amount, Decimal::new(20, 0));

    h.clock.set(b.due_date + Duration::days(41));
    let b = h.services.borrows.return_book(b.id).await.unwrap();
    assert_eq!(b.fine_amount, Decimal::new(20, 0));

    let fay = h.user(forty_one.id).await;
    assert_eq!(fay.credit_score, 59);
    assert_eq!(fay.status, UserStatus::Frozen);
}

#[tokio::test]
async fn confirmed_hold_reserves_the_returned_copy() {
    let h = harness();
    let book = h.book(1).await;
    let holder = h.reader("gil").await;
    let waiting = h.reader("hal").await;
    let walk_in = h.reader("ivy").await;

    let loan = h.services.borrows.borrow(holder.id, book.id, 14).await.unwrap();
    let hold = h
        .services
        .reservations
        .reserve(waiting.id, book.id, 3)
        .await
        .unwrap();
    assert_eq!(hold.status, ReserveStatus::Waiting);

    let err = h.services.reservations.confirm(hold.id).await.unwrap_err();
    assert!(matches!(err, AppError::OutOfStock(_)));

    h.services.borrows.return_book(loan.id).await.unwrap();
    h.services.reservations.confirm(hold.id).await.unwrap();

    let err = h.services.borrows.borrow(walk_in.id, book.id, 14).await.unwrap_err();
    assert!(matches!(err, AppError::ReservedByOther(_)));

    h.services.borrows.borrow(waiting.id, book.id, 14).await.unwrap();
    let hold = h.services.reservations.get_reservation(hold.id).await.unwrap();
    assert_eq!(hold.status, ReserveStatus::Completed);
    assert_eq!(h.stock(book.id).await.available_stock, 0);

    let err = h
        .services
        .reservations
        .cancel(hold.id, Actor::reader(waiting.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ReservationCompleted(_)));
}

#[tokio::test]
async fn duplicate_reservation_is_rejected() {
    let h = harness();
    let book = h.book(1).await;
    let reader = h.reader("jo").await;

    h.services.reservations.reserve(reader.id, book.id, 3).await.unwrap();
    let err = h
        .services
        .reservations
        .reserve(reader.id, book.id, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateReservation(_)));
}

#[tokio::test]
async fn cancel_twice_reports_already_cancelled() {
    let h = harness();
    let book = h.book(1).await;
    let owner = h.reader("kim").await;
    let other = h.reader("lou").await;

    let hold = h.services.reservations.reserve(owner.id, book.id, 3).await.unwrap();

    let err = h
        .services
        .reservations
        .cancel(hold.id, Actor::reader(other.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    h.services
        .reservations
        .cancel(hold.id, Actor::reader(owner.id))
        .await
        .unwrap();
    let err = h
        .services
        .reservations
        .cancel(hold.id, Actor::admin(99))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyCancelled(_)));
    assert_eq!(
        h.services.reservations.get_reservation(hold.id).await.unwrap().status,
        ReserveStatus::Cancelled
    );
}

#[tokio::test]
async fn expired_holds_are_swept_and_cannot_be_confirmed() {
    let h = harness();
    let book = h.book(1).await;
    let short = h.reader("max").await;
    let long = h.reader("ned").await;

    let short_hold = h.services.reservations.reserve(short.id, book.id, 1).await.unwrap();
    let long_hold = h.services.reservations.reserve(long.id, book.id, 3).await.unwrap();

    let soon = h.services.sweeps.upcoming_expiring(24).await.unwrap();
    assert_eq!(soon.iter().map(|r| r.id).collect::<Vec<_>>(), vec![short_hold.id]);

    h.clock.advance(Duration::days(2));
    assert!(h.services.reservations.is_expired(short_hold.id).await.unwrap());
    let err = h.services.reservations.confirm(short_hold.id).await.unwrap_err();
    assert!(matches!(err, AppError::ReservationExpired(_)));

    let report = h.services.sweeps.sweep_expired_reservations(None).await.unwrap();
    assert_eq!(report.processed, vec![short_hold.id]);
    assert!(report.failures.is_empty());

    let again = h
        .services
        .sweeps
        .sweep_expired_reservations(Some(short_hold.id))
        .await
        .unwrap();
    assert_eq!(again.skipped, vec![short_hold.id]);

    let long_hold = h.services.reservations.get_reservation(long_hold.id).await.unwrap();
    assert_eq!(long_hold.status, ReserveStatus::Waiting);
}

#[tokio::test]
async fn overdue_sweep_is_idempotent() {
    let h = harness();
    let book = h.book(1).await;
    let reader = h.reader("oz").await;

    let record = h.services.borrows.borrow(reader.id, book.id, 14).await.unwrap();
    h.clock.set(record.due_date + Duration::days(6));

    let first = h.services.sweeps.sweep_overdue(None).await.unwrap();
    assert_eq!(first.processed, vec![record.id]);

    let marked = h.services.borrows.get_record(record.id).await.unwrap();
    assert_eq!(marked.status, BorrowStatus::Overdue);
    assert_eq!(marked.overdue_days, 6);
    assert_eq!(marked.fine_amount, Decimal::new(3, 0));
    assert!(marked.is_out());

    let second = h.services.sweeps.sweep_overdue(Some(record.id)).await.unwrap();
    assert!(second.processed.is_empty());
    assert_eq!(second.skipped, vec![record.id]);

    let user = h.user(reader.id).await;
    assert_eq!(user.credit_score, 94);
    assert_eq!(user.status, UserStatus::Normal);

    // Returning the same day charges no extra credit
    let returned = h.services.borrows.return_book(record.id).await.unwrap();
    assert_eq!(returned.fine_amount, Decimal::new(3, 0));
    assert_eq!(h.user(reader.id).await.credit_score, 94);
}

#[tokio::test]
async fn long_overdue_freezes_until_fine_is_paid() {
    let h = harness();
    let book = h.book(2).await;
    let other_book = h.book(1).await;
    let reader = h.reader("pam").await;

    let record = h.services.borrows.borrow(reader.id, book.id, 14).await.unwrap();
    h.clock.set(record.due_date + Duration::days(8));

    h.services.sweeps.sweep_overdue(None).await.unwrap();
    let frozen = h.user(reader.id).await;
    assert_eq!(frozen.status, UserStatus::Frozen);
    assert_eq!(frozen.credit_score, 92);

    let err = h.services.borrows.borrow(reader.id, other_book.id, 14).await.unwrap_err();
    assert!(matches!(err, AppError::AccountFrozen(_)));

    let err = h.services.borrows.pay_fine(record.id, reader.id).await.unwrap_err();
    assert!(matches!(err, AppError::CopyNotReturned(_)));

    h.services.borrows.return_book(record.id).await.unwrap();
    assert_eq!(h.services.borrows.unpaid_overdue(reader.id).await.unwrap().len(), 1);

    let payment = h.services.borrows.pay_fine(record.id, reader.id).await.unwrap();
    assert_eq!(payment.amount, Decimal::new(4, 0));
    assert_eq!(payment.user_status, UserStatus::Normal);

    let err = h.services.borrows.pay_fine(record.id, reader.id).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyPaid(_)));

    let paid = h.services.borrows.get_record(record.id).await.unwrap();
    assert_eq!(paid.status, BorrowStatus::Returned);
    assert!(paid.fine_paid_at.is_some());
    assert!(h.services.borrows.unpaid_overdue(reader.id).await.unwrap().is_empty());

    h.services.borrows.borrow(reader.id, other_book.id, 14).await.unwrap();
}

#[tokio::test]
async fn credit_changes_do_not_lift_a_fine_freeze() {
    let h = harness();
    let book = h.book(1).await;
    let other_book = h.book(1).await;
    let reader = h.reader("pia").await;

    let record = h.services.borrows.borrow(reader.id, book.id, 14).await.unwrap();
    h.clock.set(record.due_date + Duration::days(8));
    h.services.sweeps.sweep_overdue(None).await.unwrap();

    let lowered = h.services.accounts.adjust_credit(reader.id, -1).await.unwrap();
    assert_eq!((lowered.credit_score, lowered.status), (91, UserStatus::Frozen));
    let err = h.services.borrows.borrow(reader.id, other_book.id, 14).await.unwrap_err();
    assert!(matches!(err, AppError::AccountFrozen(_)));

    // Crossing back over the threshold while the long fine is open
    h.services.accounts.adjust_credit(reader.id, -36).await.unwrap();
    let raised = h.services.accounts.adjust_credit(reader.id, 10).await.unwrap();
    assert_eq!((raised.credit_score, raised.status), (65, UserStatus::Frozen));

    h.services.borrows.return_book(record.id).await.unwrap();
    let payment = h.services.borrows.pay_fine(record.id, reader.id).await.unwrap();
    assert_eq!(payment.user_status, UserStatus::Normal);
    assert_eq!(h.user(reader.id).await.credit_score, 65);
}

#[tokio::test]
async fn out_of_range_durations_are_rejected_without_side_effects() {
    let h = harness();
    let book = h.book(1).await;
    let reader = h.reader("rio").await;

    let err = h
        .services
        .borrows
        .borrow(reader.id, book.id, i64::MAX / 2)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(h.stock(book.id).await.available_stock, 1);
    assert!(h.store.borrows().await.is_empty());

    let record = h.services.borrows.borrow(reader.id, book.id, 14).await.unwrap();
    let err = h.services.borrows.renew(record.id, 10_000_000_000).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let unchanged = h.services.borrows.get_record(record.id).await.unwrap();
    assert_eq!((unchanged.due_date, unchanged.renew_count), (record.due_date, 0));

    let err = h
        .services
        .reservations
        .reserve(reader.id, book.id, i64::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = h.services.sweeps.upcoming_expiring(i64::MAX).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn confirm_racing_borrowers_leaves_one_loan() {
    let h = harness();
    let book = h.book(1).await;
    let holder = h.reader("sam").await;
    let hold = h.services.reservations.reserve(holder.id, book.id, 3).await.unwrap();

    let mut borrowers = vec![holder.clone()];
    for i in 0..12 {
        borrowers.push(h.reader(&format!("walk{}", i)).await);
    }

    let confirm = {
        let services = h.services.clone();
        tokio::spawn(async move { services.reservations.confirm(hold.id).await })
    };
    let mut tasks = Vec::new();
    for reader in borrowers {
        let services = h.services.clone();
        tasks.push(tokio::spawn(async move {
            (reader.id, services.borrows.borrow(reader.id, book.id, 14).await)
        }));
    }

    let confirmed = confirm.await.unwrap();
    let mut winners = Vec::new();
    for task in tasks {
        match task.await.unwrap() {
            (id, Ok(_)) => winners.push(id),
            (_, Err(AppError::OutOfStock(_))) | (_, Err(AppError::ReservedByOther(_))) => {}
            (_, Err(e)) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(h.stock(book.id).await.available_stock, 0);
    match confirmed {
        Ok(()) => {
            assert_eq!(winners, vec![holder.id]);
            let hold = h.services.reservations.get_reservation(hold.id).await.unwrap();
            assert_eq!(hold.status, ReserveStatus::Completed);
        }
        Err(AppError::OutOfStock(_)) => {}
        Err(e) => panic!("unexpected confirm error: {}", e),
    }
}

#[tokio::test]
async fn paying_an_on_time_loan_is_not_overdue() {
    let h = harness();
    let book = h.book(1).await;
    let reader = h.reader("quin").await;

    let record = h.services.borrows.borrow(reader.id, book.id, 14).await.unwrap();
    h.services.borrows.return_book(record.id).await.unwrap();

    let err = h.services.borrows.pay_fine(record.id, reader.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotOverdue(_)));
}

#[tokio::test]
async fn failed_batch_adjustment_changes_nothing() {
    let h = harness();
    let first = h.book(2).await;
    let second = h.book(1).await;
    let reader = h.reader("rex").await;

    h.services.borrows.borrow(reader.id, second.id, 14).await.unwrap();

    let err = h
        .services
        .ledger
        .batch_adjust_stock(&[
            StockAdjustment { book_id: first.id, delta: 3 },
            StockAdjustment { book_id: second.id, delta: -1 },
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock(_)));
    assert_eq!(h.stock(first.id).await.total_stock, 2);

    let books = h
        .services
        .ledger
        .batch_adjust_stock(&[
            StockAdjustment { book_id: second.id, delta: 2 },
            StockAdjustment { book_id: first.id, delta: -1 },
        ])
        .await
        .unwrap();
    assert_eq!(books.len(), 2);
    assert_eq!(h.stock(first.id).await.total_stock, 1);
    let second = h.stock(second.id).await;
    assert_eq!((second.total_stock, second.available_stock), (3, 2));
}

#[tokio::test]
async fn unknown_targets_are_not_found() {
    let h = harness();
    let book = h.book(1).await;
    let reader = h.reader("sam").await;

    assert!(matches!(
        h.services.borrows.borrow(999, book.id, 14).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        h.services.borrows.borrow(reader.id, 999, 14).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        h.services.sweeps.sweep_overdue(Some(999)).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        h.services.ledger.adjust_stock(999, 1).await,
        Err(AppError::NotFound(_))
    ));
}
