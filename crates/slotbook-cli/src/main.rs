mod display;
mod server;

use std::net::SocketAddr;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use slotbook_core::config::{
    DEFAULT_LABEL_PREFIX, DEFAULT_LANGUAGES_PROP, DEFAULT_MEETING_PROP, DEFAULT_OBJECT_TYPE,
};
use slotbook_core::{AppointmentRequest, BookingConfig};
use slotbook_crm::{AppointmentBooker, CrmClient};

#[derive(Parser)]
#[command(name = "slotbook", version, about = "Book appointments into a HubSpot custom object")]
struct Cli {
    #[command(flatten)]
    crm: CrmArgs,

    #[command(subcommand)]
    command: Command,
}

/// Connection and field-name settings, each overridable from the environment.
#[derive(Args)]
struct CrmArgs {
    /// HubSpot private-app access token.
    #[arg(long, env = "HUBSPOT_ACCESS_TOKEN", hide_env_values = true)]
    token: String,

    #[arg(long, env = "HUBSPOT_BASE_URL", default_value = "https://api.hubapi.com")]
    base_url: String,

    /// Custom object type id holding appointments.
    #[arg(long, env = "HUBSPOT_OBJECT_TYPE", default_value = DEFAULT_OBJECT_TYPE)]
    object_type: String,

    /// Field used for the meeting date when the schema has it.
    #[arg(long, env = "HUBSPOT_MEETING_PROP", default_value = DEFAULT_MEETING_PROP)]
    meeting_prop: String,

    /// Field used for the languages when the schema has it.
    #[arg(long, env = "HUBSPOT_LANGUAGES_PROP", default_value = DEFAULT_LANGUAGES_PROP)]
    languages_prop: String,

    /// Leading text of the generated display name.
    #[arg(long, env = "SLOTBOOK_LABEL_PREFIX", default_value = DEFAULT_LABEL_PREFIX)]
    label_prefix: String,
}

#[derive(Args)]
struct AppointmentArgs {
    /// Meeting date, YYYY-MM-DD.
    #[arg(long)]
    meeting: String,

    /// Comma-separated language preferences, e.g. "es,en".
    #[arg(long)]
    languages: String,
}

#[derive(Subcommand)]
enum Command {
    /// Create an appointment record.
    Book(AppointmentArgs),
    /// Find up to ten appointments matching a date and languages exactly.
    Find(AppointmentArgs),
    /// Show the discovered schema and field resolution without writing.
    Schema {
        /// Also preview the properties a booking for this date would submit.
        #[arg(long, requires = "languages")]
        meeting: Option<String>,
        #[arg(long, requires = "meeting")]
        languages: Option<String>,
    },
    /// Serve the booking endpoint over HTTP.
    Serve {
        #[arg(long, env = "SLOTBOOK_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
}

impl CrmArgs {
    fn booker(&self) -> anyhow::Result<AppointmentBooker> {
        let client = CrmClient::new(&self.base_url, self.token.clone())
            .context("configuring CRM client")?;
        let config = BookingConfig {
            object_type: self.object_type.clone(),
            meeting_prop: self.meeting_prop.clone(),
            languages_prop: self.languages_prop.clone(),
            label_prefix: self.label_prefix.clone(),
        };
        Ok(AppointmentBooker::new(client, config))
    }
}

impl AppointmentArgs {
    fn request(&self) -> anyhow::Result<AppointmentRequest> {
        Ok(AppointmentRequest::new(&*self.meeting, &*self.languages)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    tracing::info!("slotbook v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let booker = cli.crm.booker()?;

    match cli.command {
        Command::Book(args) => {
            let request = args.request()?;
            let booking = booker.book(&request).await.context("booking appointment")?;
            print!("{}", display::record_card(&booking.record));
            print!("{}", display::properties_card(&booking.properties));
        }
        Command::Find(args) => {
            let request = args.request()?;
            let found = booker.find(&request).await.context("searching appointments")?;
            print!("{}", display::search_cards(&found));
        }
        Command::Schema { meeting, languages } => {
            let discovery = booker.discover().await;
            print!("{}", display::discovery_card(&discovery));
            if let (Some(meeting), Some(languages)) = (meeting, languages) {
                let request = AppointmentRequest::new(meeting, languages)?;
                let props = booker.properties_for(&discovery, &request);
                print!("{}", display::properties_card(&props));
            }
        }
        Command::Serve { bind } => server::serve(booker, bind).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_book_with_defaults() {
        let cli = Cli::try_parse_from([
            "slotbook", "--token", "t", "book", "--meeting", "2024-03-15", "--languages", "es,en",
        ])
        .unwrap();
        assert_eq!(cli.crm.object_type, DEFAULT_OBJECT_TYPE);
        assert_eq!(cli.crm.meeting_prop, "meeting");
        let Command::Book(args) = cli.command else {
            panic!("expected book");
        };
        assert_eq!(args.request().unwrap().languages(), "es,en");
    }

    #[test]
    fn schema_preview_needs_both_values() {
        let parsed = Cli::try_parse_from(["slotbook", "--token", "t", "schema", "--meeting", "2024-03-15"]);
        assert!(parsed.is_err());
    }
}
