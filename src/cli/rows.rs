use std::io::{Write as _, stdout};

use anyhow::bail;
use baserow::Row;
use tabwriter::TabWriter;
use tracing::info;

use crate::cli::{
    Cli, Output,
    color::{ERROR, Painted, examples},
    print_row, read_json,
};

#[derive(Debug, clap::Args)]
#[command(after_long_help = examples("
  # List the writable fields of every row
  baserow rows 1234

  # Include read-only fields, as JSON
  baserow rows 1234 --all-fields -O json
"))]
pub(crate) struct RowsArgs {
    /// Table ID
    pub table_id: u64,
    /// Include read-only fields
    #[arg(long)]
    pub all_fields: bool,
}

#[derive(Debug, clap::Args)]
pub(crate) struct GetArgs {
    /// Table ID
    pub table_id: u64,
    /// Row ID
    pub row_id: u64,
    /// Replace linked row IDs with the linked rows
    #[arg(long)]
    pub linked: bool,
}

#[derive(Debug, clap::Args)]
#[command(after_long_help = examples(r#"
  # Create a row, setting a select field by its display value
  baserow add 1234 '{"Name": "Alice", "Status": "Active"}'

  # Update row 7 from a file
  baserow add 1234 --row-id 7 < row.json
"#))]
pub(crate) struct AddArgs {
    /// Table ID
    pub table_id: u64,
    /// Update this row instead of creating a new one
    #[arg(long)]
    pub row_id: Option<u64>,
    /// The row as a JSON object; reads from stdin if absent or '-'
    pub data: Option<String>,
}

#[derive(Debug, clap::Args)]
#[command(after_long_help = examples(r#"
  # Rows with an "id" are updated, the rest are created
  baserow batch 1234 rows.json
"#))]
pub(crate) struct BatchArgs {
    /// Table ID
    pub table_id: u64,
    /// A file containing a JSON array of rows; reads from stdin if absent or '-'
    pub file: Option<String>,
}

pub(crate) fn list(cli: &Cli, args: RowsArgs) -> anyhow::Result<()> {
    let RowsArgs {
        table_id,
        all_fields,
    } = args;

    let data = cli.client.get_data(table_id, !all_fields)?;

    match cli.output() {
        Output::Json => {
            serde_json::to_writer(stdout(), &data)?;
            println!();
        }
        Output::Tty => {
            let mut tw = TabWriter::new(stdout());
            writeln!(&mut tw, "ID\tROW")?;
            for (id, row) in data {
                writeln!(&mut tw, "{id}\t{}", serde_json::Value::Object(row))?;
            }

            tw.flush()?;
        }
    }

    Ok(())
}

pub(crate) fn get(cli: &Cli, args: GetArgs) -> anyhow::Result<()> {
    let GetArgs {
        table_id,
        row_id,
        linked,
    } = args;

    let row = cli.client.get_entry(table_id, row_id, linked)?;
    print_row(cli, row)
}

pub(crate) fn add(cli: &Cli, args: AddArgs) -> anyhow::Result<()> {
    let AddArgs {
        table_id,
        row_id,
        data,
    } = args;

    let row: Row = match data.as_deref() {
        Some(s) if s != "-" => serde_json::from_str(s)?,
        _ => read_json(None)?,
    };

    let id = cli.client.add_data(table_id, &row, row_id)?;
    match cli.output() {
        Output::Json => println!("{}", serde_json::json!({ "id": id })),
        Output::Tty => {
            if row_id.is_some() {
                info!("Updated row {id}");
            } else {
                info!("Created row {id}");
            }
            println!("{id}");
        }
    }

    Ok(())
}

pub(crate) fn batch(cli: &Cli, args: BatchArgs) -> anyhow::Result<()> {
    let BatchArgs { table_id, file } = args;

    let entries: Vec<Row> = read_json(file.as_deref())?;
    let total = entries.len();

    let errors = cli.client.add_data_batch(table_id, entries)?;
    if errors.is_empty() {
        info!("Wrote {total} rows");
        return Ok(());
    }

    for error in &errors {
        eprintln!("{} {error}", Painted(ERROR, "error:"));
    }

    bail!("{} batch request(s) failed", errors.len())
}
