//! Asynchronous concurrent processing strategy
//!
//! Reads commands in batches and submits orders concurrently while keeping the
//! outcome identical to a sequential replay.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent)
//!     ├── AsyncReader (batch CSV reading + order assembly)
//!     └── LoyaltyService (DashMap-backed shared state)
//! ```
//!
//! # Waves
//!
//! Orders are collected into a wave and the wave is flushed, with up to
//! `max_concurrent` orders in flight on blocking worker threads, when:
//! - a registration command arrives (it must only affect later orders)
//! - an order id already present in the wave arrives (the first occurrence
//!   must win, as it would sequentially)
//! - the wave reaches `batch_size` orders, or the file ends
//!
//! Within a wave the orders are independent: balances are sums and the
//! mechanic registry does not change, so completion order does not matter.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::core::{CommitPolicy, InMemoryLoyaltyService};
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::Command;
use crate::strategy::{execute, write_output, ProcessingStrategy};
use crate::types::{Order, OrderId};

/// Configuration for concurrent processing
#[derive(Clone, Debug, PartialEq)]
pub struct BatchConfig {
    /// Number of commands read per batch, and the largest wave of orders
    pub batch_size: usize,
    /// Maximum number of orders in flight at once
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig, replacing zero values with the defaults
    pub fn new(batch_size: usize, max_concurrent: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                default = default.batch_size,
                "Invalid batch_size (0), using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent = if max_concurrent == 0 {
            warn!(
                default = default.max_concurrent,
                "Invalid max_concurrent (0), using default"
            );
            default.max_concurrent
        } else {
            max_concurrent
        };

        Self {
            batch_size,
            max_concurrent,
        }
    }
}

/// Orders waiting to be submitted together
#[derive(Debug, Default)]
struct Wave {
    orders: Vec<Order>,
    ids: HashSet<OrderId>,
}

impl Wave {
    fn admits(&self, order: &Order) -> bool {
        !self.ids.contains(&order.order_id)
    }

    fn push(&mut self, order: Order) {
        self.ids.insert(order.order_id.clone());
        self.orders.push(order);
    }

    fn len(&self) -> usize {
        self.orders.len()
    }

    fn take(&mut self) -> Vec<Order> {
        self.ids.clear();
        std::mem::take(&mut self.orders)
    }
}

/// Asynchronous concurrent processing strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
    policy: CommitPolicy,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig, policy: CommitPolicy) -> Self {
        Self { config, policy }
    }

    /// Submit every order of the wave and wait for all of them
    async fn flush(&self, service: &InMemoryLoyaltyService, wave: &mut Wave) {
        let orders = wave.take();
        if orders.is_empty() {
            return;
        }

        let results: Vec<_> = stream::iter(orders)
            .map(|order| {
                let service = service.clone();
                tokio::task::spawn_blocking(move || {
                    execute(&service, Command::SubmitOrder(order));
                })
            })
            .buffer_unordered(self.config.max_concurrent)
            .collect()
            .await;

        for result in results {
            if let Err(e) = result {
                error!(error = %e, "Order task panicked");
            }
        }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        runtime.block_on(async {
            let service = InMemoryLoyaltyService::in_memory(self.policy.clone());

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;

            // csv-async reads futures::io, tokio files implement tokio::io
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut wave = Wave::default();
            let mut commands = 0usize;

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }
                commands += batch.len();

                for command in batch {
                    match command {
                        Command::SubmitOrder(order) => {
                            if !wave.admits(&order) || wave.len() >= self.config.batch_size {
                                self.flush(&service, &mut wave).await;
                            }
                            wave.push(order);
                        }
                        registration => {
                            self.flush(&service, &mut wave).await;
                            execute(&service, registration);
                        }
                    }
                }
            }
            self.flush(&service, &mut wave).await;
            info!(commands, strategy = "async", "Command stream processed");

            write_output(&service, output)
        })
    }
}
