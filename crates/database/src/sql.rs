//! SQL text for the aggregate reads.
//!
//! Every grouping selects the same five key columns (unused ones as typed
//! NULLs) so a single row decoder serves all of them.

use crate::store::AVG_RATE_SCALE;
use core_types::GroupBy;

struct KeyColumns {
    trade_date: &'static str,
    maker_bank: &'static str,
    taker_bank: &'static str,
    hour: &'static str,
    minute: &'static str,
    group_by: &'static str,
    order_by: &'static str,
}

const NULL_DATE: &str = "NULL::date";
const NULL_TEXT: &str = "NULL::text";
const NULL_SMALLINT: &str = "NULL::smallint";

fn key_columns(group_by: GroupBy) -> KeyColumns {
    let base = KeyColumns {
        trade_date: NULL_DATE,
        maker_bank: NULL_TEXT,
        taker_bank: NULL_TEXT,
        hour: NULL_SMALLINT,
        minute: NULL_SMALLINT,
        group_by: "",
        order_by: "",
    };
    match group_by {
        GroupBy::MakerBank => KeyColumns {
            maker_bank: "maker_bank",
            group_by: "maker_bank",
            order_by: r#"total_amount DESC, maker_bank COLLATE "C" ASC"#,
            ..base
        },
        GroupBy::TakerBank => KeyColumns {
            taker_bank: "taker_bank",
            group_by: "taker_bank",
            order_by: r#"total_amount DESC, taker_bank COLLATE "C" ASC"#,
            ..base
        },
        GroupBy::TradeDate => KeyColumns {
            trade_date: "trade_date",
            group_by: "trade_date",
            order_by: "trade_date ASC",
            ..base
        },
        GroupBy::Hour => KeyColumns {
            hour: "hour",
            group_by: "hour",
            order_by: "hour ASC",
            ..base
        },
        GroupBy::HourMinute => KeyColumns {
            hour: "hour",
            minute: "minute",
            group_by: "hour, minute",
            order_by: "hour ASC, minute ASC",
            ..base
        },
        GroupBy::DateMinute => KeyColumns {
            trade_date: "trade_date",
            hour: "hour",
            minute: "minute",
            group_by: "trade_date, hour, minute",
            order_by: "trade_date ASC, hour ASC, minute ASC",
            ..base
        },
        GroupBy::MakerTaker => KeyColumns {
            maker_bank: "maker_bank",
            taker_bank: "taker_bank",
            group_by: "maker_bank, taker_bank",
            order_by: r#"maker_bank COLLATE "C" ASC, taker_bank COLLATE "C" ASC"#,
            ..base
        },
        GroupBy::MakerHour => KeyColumns {
            maker_bank: "maker_bank",
            hour: "hour",
            group_by: "maker_bank, hour",
            order_by: r#"maker_bank COLLATE "C" ASC, hour ASC"#,
            ..base
        },
    }
}

/// Builds the grouped read for `group_by`.
///
/// `$1` and `$2` are the optional inclusive date bounds (`NULL` = unbounded).
pub fn aggregate_sql(group_by: GroupBy) -> String {
    let k = key_columns(group_by);
    format!(
        "SELECT {trade_date} AS trade_date, {maker_bank} AS maker_bank, {taker_bank} AS taker_bank, \
         {hour} AS hour, {minute} AS minute, \
         SUM(amount) AS total_amount, COUNT(*) AS trade_count, \
         MIN(rate) AS min_rate, MAX(rate) AS max_rate, ROUND(AVG(rate), {scale}) AS avg_rate \
         FROM trades \
         WHERE ($1::date IS NULL OR trade_date >= $1) AND ($2::date IS NULL OR trade_date <= $2) \
         GROUP BY {group} \
         ORDER BY {order}",
        trade_date = k.trade_date,
        maker_bank = k.maker_bank,
        taker_bank = k.taker_bank,
        hour = k.hour,
        minute = k.minute,
        group = k.group_by,
        order = k.order_by,
        scale = AVG_RATE_SCALE,
    )
}

pub const DAILY_SUMMARY_SQL: &str = "SELECT trade_date, COUNT(*) AS transactions, SUM(amount) AS volume_total, \
     COUNT(DISTINCT maker_bank) AS nb_makers, COUNT(DISTINCT taker_bank) AS nb_takers \
     FROM trades GROUP BY trade_date ORDER BY trade_date DESC";

pub const LOAD_ALL_SQL: &str = "SELECT trade_date, amount, rate, maker_bank, taker_bank, hour, minute \
     FROM trades ORDER BY trade_date ASC, hour ASC, minute ASC, id ASC";

pub const INSERT_PREFIX: &str =
    "INSERT INTO trades (trade_date, hour, minute, amount, rate, maker_bank, taker_bank) ";

/// Bind parameters per inserted row.
pub const INSERT_COLUMNS: usize = 7;

/// PostgreSQL accepts at most 65535 bind parameters per statement.
pub const MAX_ROWS_PER_INSERT: usize = u16::MAX as usize / INSERT_COLUMNS;
