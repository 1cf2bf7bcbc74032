//! admitdesk - command-line admissions console.
//!
//! Staff commands read through the query cache and write through the
//! mutation dispatcher; the `draft` commands drive the applicant wizard
//! stored in the local data directory.

mod commands;

use std::io;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use admitdesk_core::draft::AttachmentSlot;
use admitdesk_core::models::ApplicationStatus;

const USAGE: &str = "\
Usage: admitdesk <command> [options]

Commands:
  login <username> [--remember]     Log in (--remember keeps the password in the keychain)
  logout                            Forget the session and any remembered password
  applications [--page N] [--search TEXT]
  status <application-id> <new|reviewing|accepted|rejected>
  subjects [--page N]
  subject-add <name> [--max-score N]
  staff [--page N]
  places <admission-id> [--page N]
  stats [--region NAME]
  draft show                        Show the in-progress application
  draft add-education <school> --year YEAR [--gpa GPA]
  draft add-guardian <full-name> <relation> <phone>
  draft add-olympic <subject> <place> <year>
  draft add-document <kind>
  draft attach <education|olympic|document> <index> <file>
  draft next                        Check the current step and move on
  draft submit
  draft clear
";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { username: String, remember: bool },
    Logout,
    Applications { page: u32, search: Option<String> },
    SetStatus { id: i64, status: ApplicationStatus },
    Subjects { page: u32 },
    AddSubject { name: String, max_score: Option<u32> },
    Staff { page: u32 },
    Places { admission_id: i64, page: u32 },
    Stats { region: Option<String> },
    DraftShow,
    DraftAddEducation { school: String, gpa: Option<f64>, year: i32 },
    DraftAddGuardian { full_name: String, relation: String, phone: String },
    DraftAddOlympic { subject: String, place: u32, year: i32 },
    DraftAddDocument { kind: String },
    DraftNext,
    DraftAttach { slot: AttachmentSlot, path: String },
    DraftSubmit,
    DraftClear,
    Help,
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). The returned guard
/// flushes the non-blocking writer and must live until exit.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    info!(?command, "admitdesk starting");
    if command == Command::Help {
        print!("{}", USAGE);
        return Ok(());
    }
    commands::run(command).await
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some((name, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };
    let mut opts = Options::new(rest);

    let command = match name.as_str() {
        "help" | "--help" | "-h" => Command::Help,
        "login" => {
            let remember = opts.flag("--remember");
            Command::Login {
                username: opts.positional("username")?,
                remember,
            }
        }
        "logout" => Command::Logout,
        "applications" => Command::Applications {
            page: opts.page()?,
            search: opts.value("--search")?,
        },
        "status" => {
            let id = parse_number(&opts.positional("application-id")?, "application id")?;
            let raw = opts.positional("status")?;
            let status = ApplicationStatus::parse(&raw)
                .with_context(|| format!("Unknown status '{}'", raw))?;
            Command::SetStatus { id, status }
        }
        "subjects" => Command::Subjects { page: opts.page()? },
        "subject-add" => {
            let max_score = opts
                .value("--max-score")?
                .map(|v| parse_number(&v, "max score"))
                .transpose()?;
            Command::AddSubject {
                name: opts.positional("name")?,
                max_score,
            }
        }
        "staff" => Command::Staff { page: opts.page()? },
        "places" => {
            let page = opts.page()?;
            Command::Places {
                admission_id: parse_number(&opts.positional("admission-id")?, "admission id")?,
                page,
            }
        }
        "stats" => Command::Stats {
            region: opts.value("--region")?,
        },
        "draft" => match opts.positional("draft action")?.as_str() {
            "show" => Command::DraftShow,
            "next" => Command::DraftNext,
            "submit" => Command::DraftSubmit,
            "clear" => Command::DraftClear,
            "add-education" => {
                let gpa = opts
                    .value("--gpa")?
                    .map(|v| parse_number(&v, "GPA"))
                    .transpose()?;
                let year = match opts.value("--year")? {
                    Some(raw) => parse_number(&raw, "year")?,
                    None => bail!("--year is required"),
                };
                Command::DraftAddEducation {
                    school: opts.positional("school name")?,
                    gpa,
                    year,
                }
            }
            "add-guardian" => Command::DraftAddGuardian {
                full_name: opts.positional("full name")?,
                relation: opts.positional("relation")?,
                phone: opts.positional("phone")?,
            },
            "add-olympic" => Command::DraftAddOlympic {
                subject: opts.positional("subject")?,
                place: parse_number(&opts.positional("place")?, "place")?,
                year: parse_number(&opts.positional("year")?, "year")?,
            },
            "add-document" => Command::DraftAddDocument {
                kind: opts.positional("document kind")?,
            },
            "attach" => {
                let kind = opts.positional("record kind")?;
                let index: usize = parse_number(&opts.positional("index")?, "index")?;
                let slot = match kind.as_str() {
                    "education" => AttachmentSlot::Education(index),
                    "olympic" => AttachmentSlot::Olympic(index),
                    "document" => AttachmentSlot::Document(index),
                    other => bail!("Unknown record kind '{}'", other),
                };
                Command::DraftAttach {
                    slot,
                    path: opts.positional("file")?,
                }
            }
            other => bail!("Unknown draft action '{}'", other),
        },
        other => bail!("Unknown command '{}'", other),
    };

    opts.finish()?;
    Ok(command)
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("Invalid {}: '{}'", what, raw))
}

/// Remaining arguments of one command. Options are taken out first, so
/// positionals may appear anywhere.
struct Options {
    args: Vec<String>,
}

impl Options {
    fn new(args: &[String]) -> Self {
        Self {
            args: args.to_vec(),
        }
    }

    fn flag(&mut self, name: &str) -> bool {
        match self.args.iter().position(|a| a == name) {
            Some(i) => {
                self.args.remove(i);
                true
            }
            None => false,
        }
    }

    fn value(&mut self, name: &str) -> Result<Option<String>> {
        let Some(i) = self.args.iter().position(|a| a == name) else {
            return Ok(None);
        };
        if i + 1 >= self.args.len() {
            bail!("{} needs a value", name);
        }
        let value = self.args.remove(i + 1);
        self.args.remove(i);
        Ok(Some(value))
    }

    fn page(&mut self) -> Result<u32> {
        match self.value("--page")? {
            Some(raw) => {
                let page: u32 = parse_number(&raw, "page")?;
                if page == 0 {
                    bail!("Pages start at 1");
                }
                Ok(page)
            }
            None => Ok(1),
        }
    }

    fn positional(&mut self, what: &str) -> Result<String> {
        match self.args.iter().position(|a| !a.starts_with("--")) {
            Some(i) => Ok(self.args.remove(i)),
            None => bail!("Missing {}", what),
        }
    }

    fn finish(self) -> Result<()> {
        match self.args.first() {
            Some(extra) => bail!("Unexpected argument '{}'", extra),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command> {
        let args: Vec<String> = line.split_whitespace().map(String::from).collect();
        parse_args(&args)
    }

    #[test]
    fn test_no_arguments_shows_help() {
        assert_eq!(parse("").expect("parses"), Command::Help);
    }

    #[test]
    fn test_login() {
        assert_eq!(
            parse("login --remember registrar").expect("parses"),
            Command::Login {
                username: "registrar".to_string(),
                remember: true
            }
        );
        assert!(parse("login").is_err());
    }

    #[test]
    fn test_applications_options() {
        assert_eq!(
            parse("applications --search karimov --page 3").expect("parses"),
            Command::Applications {
                page: 3,
                search: Some("karimov".to_string())
            }
        );
        assert_eq!(
            parse("applications").expect("parses"),
            Command::Applications { page: 1, search: None }
        );
        assert!(parse("applications --page 0").is_err());
        assert!(parse("applications --page").is_err());
    }

    #[test]
    fn test_status() {
        assert_eq!(
            parse("status 17 accepted").expect("parses"),
            Command::SetStatus {
                id: 17,
                status: ApplicationStatus::Accepted
            }
        );
        assert!(parse("status 17 pending").is_err());
        assert!(parse("status x accepted").is_err());
    }

    #[test]
    fn test_subject_add() {
        assert_eq!(
            parse("subject-add Biology --max-score 100").expect("parses"),
            Command::AddSubject {
                name: "Biology".to_string(),
                max_score: Some(100)
            }
        );
    }

    #[test]
    fn test_draft_attach() {
        assert_eq!(
            parse("draft attach olympic 1 cert.pdf").expect("parses"),
            Command::DraftAttach {
                slot: AttachmentSlot::Olympic(1),
                path: "cert.pdf".to_string()
            }
        );
        assert!(parse("draft attach guardian 0 x.pdf").is_err());
        assert!(parse("draft rename").is_err());
    }

    #[test]
    fn test_draft_records() {
        assert_eq!(
            parse("draft add-education Lyceum --gpa 4.5 --year 2023").expect("parses"),
            Command::DraftAddEducation {
                school: "Lyceum".to_string(),
                gpa: Some(4.5),
                year: 2023
            }
        );
        assert_eq!(
            parse("draft add-education Lyceum --year 2023").expect("parses"),
            Command::DraftAddEducation {
                school: "Lyceum".to_string(),
                gpa: None,
                year: 2023
            }
        );
        assert!(parse("draft add-education Lyceum --gpa 4.5").is_err());
        assert!(parse("draft add-education Lyceum --year 2023 --gpa high").is_err());

        assert_eq!(
            parse("draft add-guardian Yusupova mother +998901112233").expect("parses"),
            Command::DraftAddGuardian {
                full_name: "Yusupova".to_string(),
                relation: "mother".to_string(),
                phone: "+998901112233".to_string()
            }
        );
        assert!(parse("draft add-guardian Yusupova mother").is_err());

        assert_eq!(
            parse("draft add-olympic Chemistry 2 2022").expect("parses"),
            Command::DraftAddOlympic {
                subject: "Chemistry".to_string(),
                place: 2,
                year: 2022
            }
        );
        assert!(parse("draft add-olympic Chemistry second 2022").is_err());

        assert_eq!(
            parse("draft add-document passport").expect("parses"),
            Command::DraftAddDocument {
                kind: "passport".to_string()
            }
        );
        assert_eq!(parse("draft next").expect("parses"), Command::DraftNext);
        assert!(parse("draft next now").is_err());
    }

    #[test]
    fn test_extra_arguments_rejected() {
        assert!(parse("logout now").is_err());
        assert!(parse("frobnicate").is_err());
    }
}
