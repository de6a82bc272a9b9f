use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand, ValueEnum};

use super::Commands;
use crate::clock::SharedClock;
use crate::config::{AppConfig, SortDirection};
use crate::model::{Profile, TimelineEvent};
use crate::profile::{ButtonBoard, ContactBook, ProfileRegistry};
use crate::session::{PressOutcome, ProfileSession, SessionOptions};
use crate::store::StoreHandle;
use crate::timeline::{Period, TimelineFetcher, TimelineView, TimestampFormatter};

#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProfileCommand {
    /// List every profile of the current user
    List,
    /// Create a profile (names are unique per user)
    Add(ProfileAddArgs),
    /// Delete a profile by id or name
    Remove(ProfileRemoveArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ProfileAddArgs {
    /// Display name (whitespace trimmed)
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct ProfileRemoveArgs {
    /// Profile id or name
    pub profile: String,
}

#[derive(Args, Debug, Clone)]
pub struct ButtonArgs {
    #[command(subcommand)]
    pub command: ButtonCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ButtonCommand {
    /// List a profile's buttons
    List(ProfileRef),
    /// Add a button to a profile
    Add(ButtonAddArgs),
    /// Delete one button by id
    Remove(ButtonRemoveArgs),
    /// Delete every button carrying a label
    RemoveLabel(ButtonAddArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ProfileRef {
    /// Profile id or name
    pub profile: String,
}

#[derive(Args, Debug, Clone)]
pub struct ButtonAddArgs {
    /// Profile id or name
    pub profile: String,
    /// Button label, also used as the title of logged events
    pub label: String,
}

#[derive(Args, Debug, Clone)]
pub struct ButtonRemoveArgs {
    /// Profile id or name
    pub profile: String,
    /// Button id as shown by `button list`
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct ContactArgs {
    #[command(subcommand)]
    pub command: ContactCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ContactCommand {
    /// List a profile's emergency contacts
    List(ProfileRef),
    /// Add an emergency contact
    Add(ContactAddArgs),
    /// Delete a contact by id
    Remove(ContactRemoveArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ContactAddArgs {
    /// Profile id or name
    pub profile: String,
    /// Contact name
    pub name: String,
    /// Phone number; any non-digits are dropped
    pub phone: String,
}

#[derive(Args, Debug, Clone)]
pub struct ContactRemoveArgs {
    /// Profile id or name
    pub profile: String,
    /// Contact id as shown by `contact list`
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct PressArgs {
    /// Profile id or name
    pub profile: String,
    /// Button id or label
    pub button: String,
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Profile id or name
    pub profile: String,
}

#[derive(Args, Debug, Clone)]
pub struct TimelineArgs {
    /// Narrow the timeline to the last day, week or month
    #[arg(long)]
    pub period: Option<Period>,
    /// Display order (defaults to the configured order)
    #[arg(long, value_enum)]
    pub order: Option<OrderArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortDirection {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Asc => SortDirection::Ascending,
            OrderArg::Desc => SortDirection::Descending,
        }
    }
}

/// Everything a command needs, built once by [`super::run`].
#[derive(Clone)]
pub struct CommandContext {
    pub config: Arc<AppConfig>,
    pub store: StoreHandle,
    pub clock: SharedClock,
}

impl CommandContext {
    fn user(&self) -> &str {
        &self.config.user_id
    }

    async fn registry(&self) -> Result<ProfileRegistry> {
        ProfileRegistry::load(self.store.clone(), self.user())
            .await
            .with_context(|| format!("loading profiles for {}", self.user()))
    }

    async fn resolve_profile(&self, key: &str) -> Result<Profile> {
        let registry = self.registry().await?;
        registry
            .find(key)
            .cloned()
            .ok_or_else(|| anyhow!("profile '{}' not found", key.trim()))
    }
}

pub async fn dispatch(ctx: &CommandContext, command: Commands) -> Result<()> {
    let output = match command {
        Commands::Profile(args) => handle_profile_command(ctx, args).await?,
        Commands::Button(args) => handle_button_command(ctx, args).await?,
        Commands::Contact(args) => handle_contact_command(ctx, args).await?,
        Commands::Press(args) => run_press(ctx, &args).await?,
        Commands::Session(args) => {
            let interactive = atty::is(atty::Stream::Stdin);
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            return run_session(ctx, &args, stdin.lock(), &mut stdout, interactive).await;
        }
        Commands::Timeline(args) => run_timeline(ctx, &args).await?,
    };
    print!("{output}");
    Ok(())
}

async fn handle_profile_command(ctx: &CommandContext, args: ProfileArgs) -> Result<String> {
    let mut registry = ctx.registry().await?;
    match args.command {
        ProfileCommand::List => Ok(format_profiles(registry.profiles())),
        ProfileCommand::Add(args) => {
            let profile = registry
                .create(&args.name)
                .await
                .with_context(|| format!("creating profile '{}'", args.name.trim()))?;
            Ok(format!("Created profile {} ({})\n", profile.name, profile.id))
        }
        ProfileCommand::Remove(args) => {
            let Some(profile) = registry.find(&args.profile).cloned() else {
                bail!("profile '{}' not found", args.profile.trim());
            };
            registry
                .delete(&profile.id)
                .await
                .with_context(|| format!("deleting profile '{}'", profile.name))?;
            Ok(format!("Deleted profile {} ({})\n", profile.name, profile.id))
        }
    }
}

fn format_profiles(profiles: &[Profile]) -> String {
    if profiles.is_empty() {
        return "No profiles yet.\n".to_string();
    }
    let mut out = String::new();
    for profile in profiles {
        let _ = writeln!(&mut out, "{}  {}", profile.id, profile.name);
    }
    out
}

async fn handle_button_command(ctx: &CommandContext, args: ButtonArgs) -> Result<String> {
    let key = match &args.command {
        ButtonCommand::List(args) => &args.profile,
        ButtonCommand::Add(args) | ButtonCommand::RemoveLabel(args) => &args.profile,
        ButtonCommand::Remove(args) => &args.profile,
    };
    let profile = ctx.resolve_profile(key).await?;
    let board = ButtonBoard::new(ctx.store.clone(), ctx.user(), &profile);

    match args.command {
        ButtonCommand::List(_) => {
            let buttons = board.list().await.context("listing buttons")?;
            if buttons.is_empty() {
                return Ok(format!("{} has no buttons.\n", profile.name));
            }
            let mut out = String::new();
            for button in buttons {
                let _ = writeln!(&mut out, "{}  {}", button.id, button.label);
            }
            Ok(out)
        }
        ButtonCommand::Add(args) => {
            let button = board
                .add(&args.label)
                .await
                .with_context(|| format!("adding button to {}", profile.name))?;
            Ok(format!(
                "Added button '{}' to {} ({})\n",
                button.label, profile.name, button.id
            ))
        }
        ButtonCommand::Remove(args) => {
            board
                .delete(&args.id)
                .await
                .with_context(|| format!("deleting button {}", args.id))?;
            Ok(format!("Deleted button {} from {}\n", args.id, profile.name))
        }
        ButtonCommand::RemoveLabel(args) => {
            let removed = board
                .delete_all_with_label(&args.label)
                .await
                .with_context(|| format!("deleting buttons labelled '{}'", args.label.trim()))?;
            Ok(format!(
                "Deleted {} button{} labelled '{}' from {}\n",
                removed,
                if removed == 1 { "" } else { "s" },
                args.label.trim(),
                profile.name
            ))
        }
    }
}

async fn handle_contact_command(ctx: &CommandContext, args: ContactArgs) -> Result<String> {
    let key = match &args.command {
        ContactCommand::List(args) => &args.profile,
        ContactCommand::Add(args) => &args.profile,
        ContactCommand::Remove(args) => &args.profile,
    };
    let profile = ctx.resolve_profile(key).await?;
    let book = ContactBook::new(ctx.store.clone(), ctx.user(), &profile);

    match args.command {
        ContactCommand::List(_) => {
            let contacts = book.list().await.context("listing contacts")?;
            if contacts.is_empty() {
                return Ok(format!("{} has no emergency contacts.\n", profile.name));
            }
            let mut out = String::new();
            for contact in contacts {
                let _ = writeln!(
                    &mut out,
                    "{}  {}  {}",
                    contact.id, contact.name, contact.phone
                );
            }
            Ok(out)
        }
        ContactCommand::Add(args) => {
            let contact = book
                .add(&args.name, &args.phone)
                .await
                .with_context(|| format!("adding contact to {}", profile.name))?;
            Ok(format!(
                "Added contact {} {} to {} ({})\n",
                contact.name, contact.phone, profile.name, contact.id
            ))
        }
        ContactCommand::Remove(args) => {
            book.delete(&args.id)
                .await
                .with_context(|| format!("deleting contact {}", args.id))?;
            Ok(format!("Deleted contact {} from {}\n", args.id, profile.name))
        }
    }
}

async fn open_session(ctx: &CommandContext, profile: Profile) -> Result<ProfileSession> {
    let name = profile.name.clone();
    ProfileSession::resume(
        ctx.user(),
        profile,
        ctx.store.clone(),
        ctx.clock.clone(),
        SessionOptions::from_config(&ctx.config),
    )
    .await
    .with_context(|| format!("opening {name}"))
}

async fn run_press(ctx: &CommandContext, args: &PressArgs) -> Result<String> {
    let profile = ctx.resolve_profile(&args.profile).await?;
    let board = ButtonBoard::new(ctx.store.clone(), ctx.user(), &profile);
    let Some(button) = board.find(&args.button).await.context("looking up button")? else {
        bail!("no button '{}' on {}", args.button.trim(), profile.name);
    };
    let mut session = open_session(ctx, profile).await?;
    let outcome = session
        .press(&button)
        .await
        .with_context(|| format!("logging '{}'", button.label))?;
    Ok(format_outcome(session.profile(), &outcome))
}

fn format_outcome(profile: &Profile, outcome: &PressOutcome) -> String {
    match outcome {
        PressOutcome::Logged { event_id, title } => {
            format!("Logged '{title}' for {} ({event_id})\n", profile.name)
        }
        PressOutcome::CoolingDown { notice, .. } => format!("{notice}\n"),
    }
}

/// Keeps one profile open and presses the button named on each input line.
/// Every press shares the session's cooldown. Failures are reported and the
/// session carries on; `quit` or end of input closes it.
pub async fn run_session<R: BufRead, W: Write>(
    ctx: &CommandContext,
    args: &SessionArgs,
    input: R,
    out: &mut W,
    interactive: bool,
) -> Result<()> {
    let profile = ctx.resolve_profile(&args.profile).await?;
    let board = ButtonBoard::new(ctx.store.clone(), ctx.user(), &profile);
    let mut session = open_session(ctx, profile).await?;

    if interactive {
        writeln!(
            out,
            "Session open for {}. Type a button label per line, `quit` to close.",
            session.profile().name
        )?;
        out.flush()?;
    }

    for line in input.lines() {
        let line = line.context("reading session input")?;
        let key = line.trim();
        if key.is_empty() {
            continue;
        }
        if key.eq_ignore_ascii_case("quit") || key.eq_ignore_ascii_case("exit") {
            break;
        }

        let button = match board.find(key).await {
            Ok(Some(button)) => button,
            Ok(None) => {
                writeln!(out, "No button '{key}' on {}", session.profile().name)?;
                continue;
            }
            Err(err) => {
                writeln!(out, "Could not load buttons: {err}")?;
                continue;
            }
        };
        match session.press(&button).await {
            Ok(outcome) => write!(out, "{}", format_outcome(session.profile(), &outcome))?,
            Err(err) => writeln!(out, "Could not log '{}': {err}", button.label)?,
        }
        out.flush()?;
    }
    tracing::debug!(profile = %session.profile().name, "profile session closed");
    Ok(())
}

async fn run_timeline(ctx: &CommandContext, args: &TimelineArgs) -> Result<String> {
    let registry = ctx.registry().await?;
    let period = args.period.unwrap_or(ctx.config.timeline.default_period);
    let order = args
        .order
        .map(SortDirection::from)
        .unwrap_or(ctx.config.timeline.order);

    let fetcher = TimelineFetcher::new(ctx.store.clone());
    let mut view = TimelineView::new(period);
    view.refresh(&fetcher, ctx.user(), registry.profiles(), order)
        .await;

    let formatter = TimestampFormatter::from_config(&ctx.config);
    let failed: Vec<&str> = view
        .failed_profiles()
        .iter()
        .filter_map(|id| registry.find(id).map(|profile| profile.name.as_str()))
        .collect();
    let now = ctx.clock.now().to_offset(ctx.config.utc_offset());
    let events = view.timeline(now);
    Ok(format_timeline(
        &formatter,
        period,
        order,
        registry.profiles(),
        events,
        &failed,
    ))
}

fn format_timeline(
    formatter: &TimestampFormatter,
    period: Period,
    order: SortDirection,
    profiles: &[Profile],
    events: &[TimelineEvent],
    failed: &[&str],
) -> String {
    let mut out = String::new();
    if events.is_empty() {
        out.push_str("No events in this period.\n");
    } else {
        let _ = writeln!(
            &mut out,
            "Timeline: {period} ({} event{})",
            events.len(),
            if events.len() == 1 { "" } else { "s" }
        );
        let rows: Vec<(String, &str, &str)> = events
            .iter()
            .map(|event| {
                let name = profiles
                    .iter()
                    .find(|profile| profile.id == event.profile_id)
                    .map(|profile| profile.name.as_str())
                    .unwrap_or("?");
                (
                    formatter.format(event.timestamp, period),
                    name,
                    event.title.as_str(),
                )
            })
            .collect();
        let label_width = rows.iter().map(|row| row.0.chars().count()).max().unwrap_or(0);
        let name_width = rows.iter().map(|row| row.1.chars().count()).max().unwrap_or(0);

        let mut ordered: Vec<_> = rows.iter().collect();
        if order == SortDirection::Descending {
            ordered.reverse();
        }
        for (label, name, title) in ordered {
            let _ = writeln!(
                &mut out,
                "  {label:<label_width$}  {name:<name_width$}  {title}"
            );
        }
    }
    if !failed.is_empty() {
        let _ = writeln!(&mut out, "! Could not load: {}", failed.join(", "));
    }
    out
}
