//! Response analysis: parsers turn a response into follow-up requests and items.

use std::sync::Arc;

use log::{debug, trace};

use crate::error::{BoxError, PoolError};
use crate::id::IdGenerator;
use crate::item::Data;
use crate::pool::{Entity, EntityPool};
use crate::response::Response;

/// Extracts data from a response found at the given depth.
pub type ParseResponse = Arc<dyn Fn(&Response, u32) -> (Vec<Data>, Vec<BoxError>) + Send + Sync>;

/// Runs a set of parsers over one response.
pub trait Analyzer: Entity {
    fn analyze(&self, parsers: &[ParseResponse], response: Response) -> (Vec<Data>, Vec<BoxError>);
}

/// The engine's analyzer.
///
/// Runs every parser in order and collects what they return. Every discovered request
/// is re-stamped with depth `response.depth() + 1`, whatever the parser set.
#[derive(Debug)]
pub struct ResponseAnalyzer {
    id: u32,
}

impl ResponseAnalyzer {
    pub fn new(id: u32) -> Self {
        Self { id }
    }
}

impl Entity for ResponseAnalyzer {
    fn id(&self) -> u32 {
        self.id
    }
}

impl Analyzer for ResponseAnalyzer {
    fn analyze(&self, parsers: &[ParseResponse], response: Response) -> (Vec<Data>, Vec<BoxError>) {
        if parsers.is_empty() {
            return (Vec::new(), vec!["The response parser list is empty".into()]);
        }
        if !response.is_valid() {
            return (
                Vec::new(),
                vec![format!("The response for {} has no body", response.url).into()],
            );
        }
        debug!("Parsing the response (url={})", response.url);
        let depth = response.depth();
        // Saturate so a response at the depth ceiling cannot wrap back to the seed level.
        let next_depth = depth.saturating_add(1);
        let mut data = Vec::new();
        let mut errors = Vec::new();
        for parser in parsers {
            let (found, failed) = parser(&response, depth);
            data.extend(found.into_iter().map(|datum| match datum {
                Data::Request(request) if request.depth() != next_depth => {
                    Data::Request(request.with_depth(next_depth))
                }
                other => other,
            }));
            errors.extend(failed);
        }
        trace!(
            "Analyzer {} produced {} data and {} errors",
            self.id,
            data.len(),
            errors.len()
        );
        (data, errors)
    }
}

/// Bounded pool of analyzers.
pub struct AnalyzerPool {
    pool: EntityPool<dyn Analyzer>,
}

impl AnalyzerPool {
    /// A pool of `total` [`ResponseAnalyzer`]s.
    pub fn new(total: u32) -> Result<Self, PoolError> {
        Self::with_factory(total, |id| {
            Arc::new(ResponseAnalyzer::new(id)) as Arc<dyn Analyzer>
        })
    }

    /// A pool of `total` analyzers built by `factory`, which receives a fresh id for each.
    pub fn with_factory<F>(total: u32, factory: F) -> Result<Self, PoolError>
    where
        F: Fn(u32) -> Arc<dyn Analyzer>,
    {
        let ids = IdGenerator::new();
        let pool = EntityPool::with_factory(total, || factory(ids.next()))?;
        Ok(Self { pool })
    }

    /// Borrows an analyzer, waiting while all of them are out.
    pub async fn take(&self) -> Result<Arc<dyn Analyzer>, PoolError> {
        self.pool.take().await
    }

    /// Returns an analyzer borrowed from this pool.
    pub fn release(&self, analyzer: Arc<dyn Analyzer>) -> Result<(), PoolError> {
        self.pool.release(analyzer)
    }

    pub fn total(&self) -> u32 {
        self.pool.total()
    }

    /// Analyzers currently borrowed.
    pub fn used(&self) -> u32 {
        self.pool.used()
    }

    pub fn close(&self) {
        self.pool.close()
    }
}
