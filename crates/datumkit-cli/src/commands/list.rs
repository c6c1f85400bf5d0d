//! List command - print the datums a spec produces.

use crate::app::App;
use crate::OutputFormat;
use datumkit_core::{Config, DatumError};
use std::path::Path;
use std::time::Instant;

/// Run the list command.
pub fn run(
    config: Config,
    spec_path: &Path,
    limit: usize,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let spec = super::read_spec(spec_path)?;
    let app = App::new(config)?;

    let start = Instant::now();
    let mut status = app.session.mount(spec)?;
    let mut datums = Vec::new();

    loop {
        datums.push((status.clone(), app.session.current_datum()?));
        if limit > 0 && datums.len() >= limit {
            break;
        }
        status = match app.session.next() {
            Ok(next) => next,
            Err(DatumError::OutOfRange { .. }) => break,
            Err(e) => return Err(e.into()),
        };
    }
    let elapsed = start.elapsed();
    let description = app.session.describe()?;
    app.session.unmount()?;

    match output {
        OutputFormat::Text => {
            for (status, datum) in &datums {
                println!("{}", super::format_status(status));
                print!("{}", super::format_datum(datum));
            }

            eprintln!();
            eprintln!(
                "Listed {} of {}{} datums in {:.3}ms",
                datums.len(),
                description.num_datums,
                if description.all_datums_received { "" } else { "+" },
                elapsed.as_secs_f64() * 1000.0
            );
        }
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = datums
                .iter()
                .map(|(status, datum)| {
                    serde_json::json!({
                        "id": status.id,
                        "idx": status.idx,
                        "files": datum.file_bindings(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}
