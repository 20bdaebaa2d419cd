use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use parquet::data_type::{ByteArray, ByteArrayType, DoubleType, Int32Type};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use parquet::record::RowAccessor;
use parquet::schema::parser::parse_message_type;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::tables::EventKind;

pub const FEATURE_NAMES: [&str; 7] = [
    "season",
    "team_id_for",
    "team_id_against",
    "period",
    "periodTime",
    "st_x",
    "st_y",
];

pub const EXTRACT_QUERY: &str = r#"
SELECT
    SUBSTR(game_id, 1, 4) AS season,
    team_id_for, team_id_against,
    event,
    period, periodTime,
    st_x, st_y
FROM
    game_plays
WHERE
    event IN ('Goal', 'Shot', 'Missed Shot')
    AND
        (x <> 'NA' AND y <> 'NA')
ORDER BY
    season, play_id;
"#;

const FEATURE_SCHEMA: &str = "
message model_df {
    REQUIRED INT32 season;
    REQUIRED INT32 team_id_for;
    REQUIRED INT32 team_id_against;
    REQUIRED BYTE_ARRAY event (UTF8);
    REQUIRED INT32 period;
    REQUIRED INT32 periodTime;
    REQUIRED DOUBLE st_x;
    REQUIRED DOUBLE st_y;
}
";

/// One row of the feature table: the target `event` plus seven numeric features.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRow {
    pub season: i32,
    pub team_id_for: i32,
    pub team_id_against: i32,
    pub event: EventKind,
    pub period: i32,
    pub period_time: i32,
    pub st_x: f64,
    pub st_y: f64,
}

impl PlayRow {
    pub fn features(&self) -> Vec<f64> {
        vec![
            f64::from(self.season),
            f64::from(self.team_id_for),
            f64::from(self.team_id_against),
            f64::from(self.period),
            f64::from(self.period_time),
            self.st_x,
            self.st_y,
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extract {
    pub rows: Vec<PlayRow>,
    pub skipped: usize,
}

/// Splits rows into a feature matrix and class indices.
pub fn design_matrix(rows: &[PlayRow]) -> (Vec<Vec<f64>>, Vec<usize>) {
    let x = rows.iter().map(PlayRow::features).collect();
    let y = rows.iter().map(|r| r.event.index()).collect();
    (x, y)
}

pub fn open_db(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("open sqlite db {}", path.display()))
}

/// Runs the extraction query; rows whose numeric columns do not parse are skipped.
pub fn extract_plays(conn: &Connection) -> Result<Extract> {
    let mut stmt = conn.prepare(EXTRACT_QUERY).context("prepare play query")?;
    let mut rows = stmt.query([]).context("run play query")?;

    let mut out = Extract::default();
    while let Some(row) = rows.next().context("read play row")? {
        let mut values = Vec::with_capacity(8);
        for idx in 0..8 {
            let value: Value = row.get(idx).context("read play column")?;
            values.push(value);
        }
        match play_row_from_values(&values) {
            Some(play) => out.rows.push(play),
            None => out.skipped += 1,
        }
    }

    if out.skipped > 0 {
        warn!(skipped = out.skipped, "dropped rows with non-numeric features");
    }
    info!(rows = out.rows.len(), "extracted play rows");
    Ok(out)
}

fn play_row_from_values(values: &[Value]) -> Option<PlayRow> {
    let event = match values.get(3)? {
        Value::Text(s) => EventKind::from_label(s)?,
        _ => return None,
    };
    Some(PlayRow {
        season: numeric_int(values.first()?)?,
        team_id_for: numeric_int(values.get(1)?)?,
        team_id_against: numeric_int(values.get(2)?)?,
        event,
        period: numeric_int(values.get(4)?)?,
        period_time: numeric_int(values.get(5)?)?,
        st_x: numeric(values.get(6)?)?,
        st_y: numeric(values.get(7)?)?,
    })
}

fn numeric(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Integer(i) => *i as f64,
        Value::Real(f) => *f,
        Value::Text(s) => s.trim().parse::<f64>().ok()?,
        Value::Null | Value::Blob(_) => return None,
    };
    v.is_finite().then_some(v)
}

fn numeric_int(value: &Value) -> Option<i32> {
    let v = numeric(value)?;
    if v.fract() != 0.0 || v < f64::from(i32::MIN) || v > f64::from(i32::MAX) {
        return None;
    }
    Some(v as i32)
}

pub fn write_feature_table(path: &Path, rows: &[PlayRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let schema = Arc::new(parse_message_type(FEATURE_SCHEMA).context("parse feature schema")?);
    let props = Arc::new(WriterProperties::builder().build());
    let file = fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer =
        SerializedFileWriter::new(file, schema, props).context("open parquet writer")?;

    let mut group = writer.next_row_group().context("start row group")?;
    let mut col_idx = 0usize;
    while let Some(mut column) = group.next_column().context("next parquet column")? {
        match col_idx {
            0..=2 | 4 | 5 => {
                let values: Vec<i32> = rows.iter().map(|r| int_column(r, col_idx)).collect();
                column
                    .typed::<Int32Type>()
                    .write_batch(&values, None, None)
                    .with_context(|| format!("write column {}", FEATURE_SCHEMA_COLUMNS[col_idx]))?;
            }
            3 => {
                let values: Vec<ByteArray> = rows
                    .iter()
                    .map(|r| ByteArray::from(r.event.label()))
                    .collect();
                column
                    .typed::<ByteArrayType>()
                    .write_batch(&values, None, None)
                    .context("write column event")?;
            }
            _ => {
                let values: Vec<f64> = rows
                    .iter()
                    .map(|r| if col_idx == 6 { r.st_x } else { r.st_y })
                    .collect();
                column
                    .typed::<DoubleType>()
                    .write_batch(&values, None, None)
                    .with_context(|| format!("write column {}", FEATURE_SCHEMA_COLUMNS[col_idx]))?;
            }
        }
        column.close().context("close parquet column")?;
        col_idx += 1;
    }
    group.close().context("close row group")?;
    writer.close().context("close parquet writer")?;
    Ok(())
}

const FEATURE_SCHEMA_COLUMNS: [&str; 8] = [
    "season",
    "team_id_for",
    "team_id_against",
    "event",
    "period",
    "periodTime",
    "st_x",
    "st_y",
];

fn int_column(row: &PlayRow, idx: usize) -> i32 {
    match idx {
        0 => row.season,
        1 => row.team_id_for,
        2 => row.team_id_against,
        4 => row.period,
        _ => row.period_time,
    }
}

pub fn read_feature_table(path: &Path) -> Result<Vec<PlayRow>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open parquet reader features")?;
    let iter = reader.get_row_iter(None).context("iterate feature rows")?;

    let mut out = Vec::new();
    for row in iter {
        let row = row.context("decode feature row")?;
        let label = row.get_string(3).context("read event column")?;
        let event =
            EventKind::from_label(label).ok_or_else(|| anyhow!("unknown event label {label:?}"))?;
        out.push(PlayRow {
            season: row.get_int(0).context("read season")?,
            team_id_for: row.get_int(1).context("read team_id_for")?,
            team_id_against: row.get_int(2).context("read team_id_against")?,
            event,
            period: row.get_int(4).context("read period")?,
            period_time: row.get_int(5).context("read periodTime")?,
            st_x: row.get_double(6).context("read st_x")?,
            st_y: row.get_double(7).context("read st_y")?,
        });
    }
    Ok(out)
}
