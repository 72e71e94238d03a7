use std::sync::Arc;

use sqlx::PgPool;

use crate::services::booking::BookingLedger;
use crate::services::catalog::CatalogStore;
use crate::services::payment::PaymentProvider;
use crate::services::reconciler::PaymentReconciler;

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogStore,
    pub bookings: BookingLedger,
    pub reconciler: PaymentReconciler,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        payments: Option<Arc<dyn PaymentProvider>>,
        webhook_token: Option<String>,
    ) -> Self {
        Self {
            catalog: CatalogStore::new(pool.clone()),
            bookings: BookingLedger::new(pool.clone(), payments),
            reconciler: PaymentReconciler::new(pool, webhook_token),
        }
    }
}
