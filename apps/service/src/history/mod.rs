//! Read side of the monitoring engine.
//!
//! Turns the persisted check stream of an endpoint into the views a
//! dashboard needs: latest status, rolling averages, a bounded recent
//! history for sparklines and whole-history statistics.

pub mod aggregator;

pub use aggregator::{
    CheckHistoryPage, CheckStatistics, EndpointOverview, HistoryAggregator, HistoryEntry,
    LatestStatus, Pagination, DEFAULT_AVERAGE_WINDOW, DEFAULT_HISTORY_LIMIT, DEFAULT_PAGE_SIZE,
};
