//! Mount command - mount a spec and show the first datum.

use crate::app::App;
use crate::OutputFormat;
use datumkit_core::Config;
use std::path::Path;

/// Run the mount command.
pub fn run(config: Config, spec_path: &Path, output: OutputFormat) -> anyhow::Result<()> {
    let spec = super::read_spec(spec_path)?;
    let app = App::new(config)?;

    let status = app.session.mount(spec)?;
    let datum = app.session.current_datum()?;

    match output {
        OutputFormat::Text => {
            println!("Mounted {}", app.session.describe()?.summary);
            println!("{}", super::format_status(&status));
            print!("{}", super::format_datum(&datum));
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "status": status,
                "files": datum.file_bindings(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}
