//! CSV format handling for the command stream and balance output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to typed rows
//! - Assembly of consecutive item rows into whole orders
//! - Balance output serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! # Input format
//!
//! ```text
//! type,order,client,match,reward_type,reward,item,price,count
//! client,,alice,,,,,,
//! mechanic,,,sku1,pt,10,,,
//! item,X,alice,,,,sku1,100,3
//! item,X,alice,,,,sku2,50,1
//! ```
//!
//! Consecutive `item` rows with the same `order` form one order.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::types::{Account, Item, MechanicRequest, Order, OrderId};

/// CSV record structure for deserialization
///
/// Every column except `type` is optional; which ones are required depends
/// on the row type.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub row_type: String,
    pub order: Option<String>,
    pub client: Option<String>,
    #[serde(rename = "match")]
    pub match_key: Option<String>,
    pub reward_type: Option<String>,
    pub reward: Option<String>,
    pub item: Option<String>,
    pub price: Option<String>,
    pub count: Option<String>,
}

/// A single converted input row
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Client { login: String },
    Mechanic(MechanicRequest),
    Item { order_id: OrderId, client_id: String, item: Item },
}

/// A row that could not be converted
///
/// Carries the order id when the row was an order line, so the order it
/// belongs to can be dropped instead of being submitted without that line.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub order_id: Option<OrderId>,
    pub message: String,
}

impl RowError {
    fn new(order_id: Option<&str>, message: String) -> Self {
        Self {
            order_id: order_id.map(str::to_string),
            message,
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A complete command ready for the loyalty service
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RegisterClient { login: String },
    RegisterMechanic(MechanicRequest),
    SubmitOrder(Order),
}

impl Command {
    /// Registration commands change what later orders observe
    pub fn is_registration(&self) -> bool {
        !matches!(self, Command::SubmitOrder(_))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_number<T: FromStr>(
    value: Option<String>,
    column: &str,
    order_id: Option<&str>,
) -> Result<T, RowError> {
    let raw = non_empty(value)
        .ok_or_else(|| RowError::new(order_id, format!("Missing '{}' column", column)))?;
    raw.trim()
        .parse::<T>()
        .map_err(|_| RowError::new(order_id, format!("Invalid {} '{}'", column, raw)))
}

/// Convert a CsvRecord into a typed row
///
/// Field values are only parsed here, not validated: a negative price or an
/// unknown reward type still converts and is rejected by the service with a
/// typed error.
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<Row, RowError> {
    match csv_record.row_type.to_lowercase().as_str() {
        "client" => {
            let login = csv_record.client.unwrap_or_default();
            Ok(Row::Client { login })
        }
        "mechanic" => {
            let reward = match non_empty(csv_record.reward) {
                Some(raw) => Decimal::from_str(raw.trim())
                    .map_err(|_| RowError::new(None, format!("Invalid reward '{}'", raw)))?,
                None => Decimal::ZERO,
            };
            Ok(Row::Mechanic(MechanicRequest {
                match_key: csv_record.match_key.unwrap_or_default(),
                reward_type: csv_record.reward_type.unwrap_or_default(),
                reward,
            }))
        }
        "item" => {
            let order_id = non_empty(csv_record.order)
                .ok_or_else(|| RowError::new(None, "Item row without 'order' column".to_string()))?;
            let oid = Some(order_id.as_str());
            let client_id = non_empty(csv_record.client)
                .ok_or_else(|| RowError::new(oid, format!("Item row for order {} without 'client'", order_id)))?;
            let id = non_empty(csv_record.item)
                .ok_or_else(|| RowError::new(oid, format!("Item row for order {} without 'item'", order_id)))?;
            let price = parse_number::<i64>(csv_record.price, "price", oid)?;
            let count = parse_number::<i64>(csv_record.count, "count", oid)?;

            Ok(Row::Item {
                order_id,
                client_id,
                item: Item::new(id, price, count),
            })
        }
        other => Err(RowError::new(None, format!("Invalid row type: '{}'", other))),
    }
}

#[derive(Debug)]
struct PendingOrder {
    order: Order,
    poisoned: Option<String>,
}

/// Groups consecutive item rows into orders
///
/// Rows are fed in file order; a command is emitted as soon as it is
/// complete. An order with any malformed line is dropped as a whole.
#[derive(Debug, Default)]
pub struct CommandAssembler {
    pending: Option<PendingOrder>,
}

impl CommandAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the conversion result of the next row
    ///
    /// Returns the commands completed by this row, in order (at most two: a
    /// finished order followed by a registration).
    pub fn feed(&mut self, converted: Result<Row, RowError>) -> Vec<Command> {
        let mut ready = Vec::new();

        match converted {
            Ok(Row::Client { login }) => {
                ready.extend(self.finish());
                ready.push(Command::RegisterClient { login });
            }
            Ok(Row::Mechanic(request)) => {
                ready.extend(self.finish());
                ready.push(Command::RegisterMechanic(request));
            }
            Ok(Row::Item {
                order_id,
                client_id,
                item,
            }) => {
                if !self.continues(&order_id) {
                    ready.extend(self.finish());
                    self.pending = Some(PendingOrder {
                        order: Order::new(order_id, client_id.clone(), Vec::new()),
                        poisoned: None,
                    });
                }
                if let Some(pending) = self.pending.as_mut() {
                    if pending.order.client_id != client_id && pending.poisoned.is_none() {
                        pending.poisoned = Some(format!(
                            "line for client '{}' in an order of client '{}'",
                            client_id, pending.order.client_id
                        ));
                    }
                    pending.order.items.push(item);
                }
            }
            Err(error) => {
                warn!(error = %error, "Skipping malformed row");
                if let Some(order_id) = error.order_id {
                    if !self.continues(&order_id) {
                        ready.extend(self.finish());
                        self.pending = Some(PendingOrder {
                            order: Order::new(order_id, String::new(), Vec::new()),
                            poisoned: None,
                        });
                    }
                    if let Some(pending) = self.pending.as_mut() {
                        pending.poisoned.get_or_insert(error.message);
                    }
                }
            }
        }

        ready
    }

    /// Emit the order still being assembled, if any
    pub fn finish(&mut self) -> Option<Command> {
        let pending = self.pending.take()?;
        match pending.poisoned {
            Some(reason) => {
                warn!(
                    order_id = %pending.order.order_id,
                    reason = %reason,
                    "Dropping order with malformed lines"
                );
                None
            }
            None => Some(Command::SubmitOrder(pending.order)),
        }
    }

    fn continues(&self, order_id: &str) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| pending.order.order_id == order_id)
    }
}

/// Write balances to CSV format
///
/// Writes accounts with columns: client, balance.
/// Accounts are sorted by client id for deterministic output.
pub fn write_balances_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["client", "balance"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts: Vec<&Account> = accounts.iter().collect();
    sorted_accounts.sort_by(|a, b| a.client.cmp(&b.client));

    for account in sorted_accounts {
        writer
            .write_record([account.client.clone(), account.balance.to_string()])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn item_record(order: &str, client: &str, item: &str, price: &str, count: &str) -> CsvRecord {
        CsvRecord {
            row_type: "item".to_string(),
            order: Some(order.to_string()),
            client: Some(client.to_string()),
            item: Some(item.to_string()),
            price: Some(price.to_string()),
            count: Some(count.to_string()),
            ..CsvRecord::default()
        }
    }

    fn item_row(order: &str, client: &str, item: &str, price: i64) -> Result<Row, RowError> {
        Ok(Row::Item {
            order_id: order.to_string(),
            client_id: client.to_string(),
            item: Item::new(item, price, 1),
        })
    }

    #[test]
    fn test_convert_client_row() {
        let record = CsvRecord {
            row_type: "client".to_string(),
            client: Some("alice".to_string()),
            ..CsvRecord::default()
        };
        assert_eq!(
            convert_csv_record(record),
            Ok(Row::Client {
                login: "alice".to_string()
            })
        );
    }

    #[rstest]
    #[case::points(Some("pt"), Some("10"), "pt", Decimal::TEN)]
    #[case::percent_fraction(Some("%"), Some("2.5"), "%", Decimal::new(25, 1))]
    #[case::missing_reward(Some("%"), None, "%", Decimal::ZERO)]
    #[case::missing_type(None, Some("10"), "", Decimal::TEN)]
    fn test_convert_mechanic_row(
        #[case] reward_type: Option<&str>,
        #[case] reward: Option<&str>,
        #[case] expected_type: &str,
        #[case] expected_reward: Decimal,
    ) {
        let record = CsvRecord {
            row_type: "Mechanic".to_string(),
            match_key: Some("sku1".to_string()),
            reward_type: reward_type.map(str::to_string),
            reward: reward.map(str::to_string),
            ..CsvRecord::default()
        };
        assert_eq!(
            convert_csv_record(record),
            Ok(Row::Mechanic(MechanicRequest::new(
                "sku1",
                expected_type,
                expected_reward
            )))
        );
    }

    #[test]
    fn test_convert_item_row_keeps_out_of_range_values() {
        let row = convert_csv_record(item_record("X", "alice", "sku1", "-5", "0")).unwrap();
        assert_eq!(
            row,
            Row::Item {
                order_id: "X".to_string(),
                client_id: "alice".to_string(),
                item: Item::new("sku1", -5, 0),
            }
        );
    }

    #[rstest]
    #[case::bad_price(item_record("X", "alice", "sku1", "abc", "1"), Some("X"), "Invalid price")]
    #[case::missing_count(item_record("X", "alice", "sku1", "1", ""), Some("X"), "Missing 'count'")]
    #[case::missing_client(item_record("X", "", "sku1", "1", "1"), Some("X"), "without 'client'")]
    #[case::missing_order(item_record("", "alice", "sku1", "1", "1"), None, "without 'order'")]
    #[case::unknown_type(
        CsvRecord { row_type: "refund".to_string(), ..CsvRecord::default() },
        None,
        "Invalid row type"
    )]
    fn test_convert_errors(
        #[case] record: CsvRecord,
        #[case] order_id: Option<&str>,
        #[case] expected_error: &str,
    ) {
        let error = convert_csv_record(record).unwrap_err();
        assert_eq!(error.order_id.as_deref(), order_id);
        assert!(error.message.contains(expected_error), "got: {}", error);
    }

    #[test]
    fn test_assembler_groups_consecutive_items() {
        let mut assembler = CommandAssembler::new();

        assert!(assembler.feed(item_row("X", "alice", "a", 1)).is_empty());
        assert!(assembler.feed(item_row("X", "alice", "b", 2)).is_empty());
        let ready = assembler.feed(item_row("Y", "bob", "a", 3));
        assert_eq!(
            ready,
            vec![Command::SubmitOrder(Order::new(
                "X",
                "alice",
                vec![Item::new("a", 1, 1), Item::new("b", 2, 1)]
            ))]
        );

        assert_eq!(
            assembler.finish(),
            Some(Command::SubmitOrder(Order::new("Y", "bob", vec![Item::new("a", 3, 1)])))
        );
        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn test_assembler_registration_flushes_order_first() {
        let mut assembler = CommandAssembler::new();
        assembler.feed(item_row("X", "alice", "a", 1));

        let ready = assembler.feed(Ok(Row::Client {
            login: "bob".to_string(),
        }));

        assert_eq!(ready.len(), 2);
        assert!(matches!(ready[0], Command::SubmitOrder(_)));
        assert_eq!(
            ready[1],
            Command::RegisterClient {
                login: "bob".to_string()
            }
        );
        assert!(ready[1].is_registration());
    }

    #[test]
    fn test_assembler_drops_order_with_malformed_line() {
        let mut assembler = CommandAssembler::new();
        assembler.feed(item_row("X", "alice", "a", 1));
        assembler.feed(convert_csv_record(item_record("X", "alice", "b", "oops", "1")));
        assembler.feed(item_row("X", "alice", "c", 1));

        let ready = assembler.feed(item_row("Y", "alice", "a", 1));
        assert!(ready.is_empty());
        assert!(matches!(assembler.finish(), Some(Command::SubmitOrder(order)) if order.order_id == "Y"));
    }

    #[test]
    fn test_assembler_drops_order_starting_with_malformed_line() {
        let mut assembler = CommandAssembler::new();
        assembler.feed(convert_csv_record(item_record("X", "alice", "a", "1", "x")));
        assembler.feed(item_row("X", "alice", "b", 1));

        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn test_assembler_drops_order_with_mixed_clients() {
        let mut assembler = CommandAssembler::new();
        assembler.feed(item_row("X", "alice", "a", 1));
        assembler.feed(item_row("X", "bob", "b", 1));

        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn test_assembler_skips_unrelated_errors() {
        let mut assembler = CommandAssembler::new();
        assembler.feed(item_row("X", "alice", "a", 1));
        assembler.feed(Err(RowError::new(None, "Invalid row type: 'x'".to_string())));

        assert!(matches!(assembler.finish(), Some(Command::SubmitOrder(_))));
    }

    #[rstest]
    #[case::sorted_by_client(
        vec![("carol", 3), ("alice", 10), ("bob", 0)],
        "client,balance\nalice,10\nbob,0\ncarol,3\n"
    )]
    #[case::empty(vec![], "client,balance\n")]
    fn test_write_balances_csv(#[case] balances: Vec<(&str, i64)>, #[case] expected_output: &str) {
        let accounts: Vec<Account> = balances
            .into_iter()
            .map(|(client, balance)| {
                let mut account = Account::new(client);
                account.balance = balance;
                account
            })
            .collect();

        let mut output = Vec::new();
        write_balances_csv(&accounts, &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), expected_output);
    }
}
