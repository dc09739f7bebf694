use std::io::{Write as _, stdout};

use tabwriter::TabWriter;

use crate::cli::{Cli, Output, color::examples};

#[derive(Debug, clap::Args)]
#[command(after_long_help = examples("
  # Show all fields of table 1234
  baserow fields 1234

  # Only the fields that can be written
  baserow fields 1234 --writable
"))]
pub(crate) struct FieldsArgs {
    /// Table ID
    pub table_id: u64,
    /// Only show fields that aren't read-only
    #[arg(long)]
    pub writable: bool,
}

pub(crate) fn handle(cli: &Cli, args: FieldsArgs) -> anyhow::Result<()> {
    let FieldsArgs { table_id, writable } = args;

    let fields = if writable {
        cli.client.writable_fields(table_id)?
    } else {
        cli.client.get_fields(table_id)?.to_vec()
    };

    match cli.output() {
        Output::Json => {
            serde_json::to_writer(stdout(), &fields)?;
            println!();
        }
        Output::Tty => {
            let mut tw = TabWriter::new(stdout());
            writeln!(&mut tw, "NAME\tTYPE\tREAD ONLY\tOPTIONS")?;
            for field in fields {
                let options = match field.kind.select_options() {
                    Some(opts) => opts
                        .iter()
                        .map(|o| o.value.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    None => String::new(),
                };

                let read_only = if field.read_only { "yes" } else { "no" };
                writeln!(
                    &mut tw,
                    "{}\t{}\t{read_only}\t{options}",
                    field.name, field.kind
                )?;
            }

            tw.flush()?;
        }
    }

    Ok(())
}
