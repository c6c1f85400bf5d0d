//! Browse command - step through datums interactively.

use crate::app::App;
use datumkit_core::{Config, DatumError, InputSpec};
use std::io::{self, BufRead, Write};
use std::path::Path;

const HELP: &str = "\
commands:
  n, next        move to the next datum
  p, prev        move to the previous datum
  s, seek <N>    jump to datum N (1-based)
  show           print the current datum
  d, describe    print the mounted spec and cursor
  m, mount       mount the spec again
  u, unmount     drop the mounted datums
  h, help        show this help
  q, quit        exit";

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Next,
    Prev,
    Seek(usize),
    Show,
    Describe,
    Mount,
    Unmount,
    Help,
    Quit,
}

fn parse_action(line: &str) -> Result<Action, String> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or("show");
    let action = match command {
        "n" | "next" => Action::Next,
        "p" | "prev" => Action::Prev,
        "s" | "seek" => {
            let arg = words.next().ok_or("seek needs a datum number")?;
            let n: usize = arg
                .parse()
                .map_err(|_| format!("not a datum number: {}", arg))?;
            if n == 0 {
                return Err("datum numbers start at 1".to_string());
            }
            Action::Seek(n - 1)
        }
        "show" => Action::Show,
        "d" | "describe" => Action::Describe,
        "m" | "mount" => Action::Mount,
        "u" | "unmount" => Action::Unmount,
        "h" | "help" | "?" => Action::Help,
        "q" | "quit" | "exit" => Action::Quit,
        other => return Err(format!("unknown command: {} (try 'help')", other)),
    };
    Ok(action)
}

/// Run the browse command.
pub fn run(config: Config, spec_path: &Path) -> anyhow::Result<()> {
    let spec = super::read_spec(spec_path)?;
    let app = App::new(config)?;

    println!(
        "Browsing {} (page size {})",
        spec.summary(),
        app.config.session.page_size
    );
    mount(&app, &spec)?;
    println!("{}", HELP);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let action = match parse_action(&line?) {
            Ok(action) => action,
            Err(message) => {
                println!("{}", message);
                continue;
            }
        };

        if action == Action::Quit {
            break;
        }
        if let Err(e) = apply(&app, &spec, action) {
            match e.downcast_ref::<DatumError>() {
                Some(err) if err.is_client_error() => println!("{}", err),
                _ => return Err(e),
            }
        }
    }

    app.session.unmount()?;
    Ok(())
}

fn mount(app: &App, spec: &InputSpec) -> anyhow::Result<()> {
    let status = app.session.mount(spec.clone())?;
    println!("{}", super::format_status(&status));
    show(app)
}

fn show(app: &App) -> anyhow::Result<()> {
    print!("{}", super::format_datum(&app.session.current_datum()?));
    Ok(())
}

fn apply(app: &App, spec: &InputSpec, action: Action) -> anyhow::Result<()> {
    let status = match action {
        Action::Next => app.session.next()?,
        Action::Prev => app.session.prev()?,
        Action::Seek(index) => app.session.seek(index)?,
        Action::Show => return show(app),
        Action::Describe => {
            let description = app.session.describe()?;
            println!("{}", description.summary);
            println!(
                "datum {} of {}{}",
                description.idx + 1,
                description.num_datums,
                if description.all_datums_received { "" } else { "+" }
            );
            return Ok(());
        }
        Action::Mount => return mount(app, spec),
        Action::Unmount => {
            app.session.unmount()?;
            println!("Unmounted.");
            return Ok(());
        }
        Action::Help => {
            println!("{}", HELP);
            return Ok(());
        }
        Action::Quit => return Ok(()),
    };

    println!("{}", super::format_status(&status));
    show(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_actions() {
        assert_eq!(parse_action("n"), Ok(Action::Next));
        assert_eq!(parse_action("  prev "), Ok(Action::Prev));
        assert_eq!(parse_action("seek 3"), Ok(Action::Seek(2)));
        assert_eq!(parse_action(""), Ok(Action::Show));
        assert_eq!(parse_action("q"), Ok(Action::Quit));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_action("seek").is_err());
        assert!(parse_action("seek zero").is_err());
        assert!(parse_action("seek 0").is_err());
        assert!(parse_action("jump").is_err());
    }
}
