//! Front-desk commands and their plain-text rendering.
//!
//! The same `DeskCommand` set serves the one-shot binary subcommands and the
//! interactive console loop.

use std::fmt::Write as _;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::TryRecvError;

use crate::auth::Session;
use crate::calendar::{display_day, resolve_query_day};
use crate::catalog::Catalog;
use crate::engine::{
    AvailabilitySnapshot, CancelOutcome, Engine, EngineError, Listing, ReservationFilter, RoomTypeFilter,
    SortOrder,
};
use crate::model::*;
use crate::notify::Topic;

#[derive(Subcommand, Clone, Debug)]
pub enum DeskCommand {
    /// Room availability on a day
    Availability {
        /// today, tomorrow, week or YYYY-MM-DD
        #[arg(short, long, default_value = "today")]
        date: String,
    },

    /// List current and upcoming reservations
    List {
        /// Only this room type id
        #[arg(short, long)]
        room_type: Option<String>,
        /// Case-insensitive guest name search
        #[arg(short, long)]
        search: Option<String>,
        /// Newest start date first
        #[arg(long)]
        desc: bool,
        /// Also list stays that started before today
        #[arg(long)]
        history: bool,
    },

    /// Book a stay
    Add {
        #[arg(short, long)]
        guest: String,
        #[arg(short, long)]
        room_type: String,
        /// Check-in day, YYYY-MM-DD
        #[arg(long)]
        start: String,
        /// Check-out day, YYYY-MM-DD
        #[arg(long)]
        end: String,
        #[arg(short, long)]
        phone: Option<String>,
        #[arg(short, long)]
        notes: Option<String>,
        /// Amount such as 150 or 150,50
        #[arg(long)]
        price: Option<Price>,
        #[arg(long)]
        responsible: Option<String>,
    },

    /// Change fields of a reservation; an empty value clears optional text
    Edit {
        id: String,
        #[arg(short, long)]
        guest: Option<String>,
        #[arg(short, long)]
        room_type: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(short, long)]
        phone: Option<String>,
        #[arg(short, long)]
        notes: Option<String>,
        #[arg(long, conflicts_with = "clear_price")]
        price: Option<Price>,
        #[arg(long)]
        clear_price: bool,
        #[arg(long)]
        responsible: Option<String>,
    },

    /// Cancel a reservation
    Cancel {
        id: String,
        /// Confirm the cancellation
        #[arg(long)]
        yes: bool,
    },

    /// Toggle the clipboard marker
    Clip { id: String },

    /// Change history of a reservation
    History { id: String },

    /// Room inventory
    Rooms,
}

#[derive(Debug)]
pub enum DeskError {
    Engine(EngineError),
    Usage(String),
}

impl std::fmt::Display for DeskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeskError::Engine(e) => write!(f, "{e}"),
            DeskError::Usage(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for DeskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeskError::Engine(e) => Some(e),
            DeskError::Usage(_) => None,
        }
    }
}

impl From<EngineError> for DeskError {
    fn from(e: EngineError) -> Self {
        DeskError::Engine(e)
    }
}

/// Run one command and render its result.
pub async fn execute(engine: &Engine, cmd: DeskCommand) -> Result<String, DeskError> {
    match cmd {
        DeskCommand::Availability { date } => {
            let day = resolve_query_day(&date, engine.today())
                .ok_or_else(|| DeskError::Usage(format!("not a day: {date:?} (use today, tomorrow, week or YYYY-MM-DD)")))?;
            Ok(render_availability(&engine.availability(day).await))
        }
        DeskCommand::List { room_type, search, desc, history } => {
            let filter = ReservationFilter {
                room_type: room_type.map_or(RoomTypeFilter::All, RoomTypeFilter::Only),
                search,
                order: if desc { SortOrder::Descending } else { SortOrder::Ascending },
            };
            let listing = engine.list_reservations(&filter).await;
            Ok(render_listing(engine.catalog(), &listing, history))
        }
        DeskCommand::Add { guest, room_type, start, end, phone, notes, price, responsible } => {
            let r = engine
                .create_reservation(NewReservation {
                    guest_name: guest,
                    phone,
                    room_type,
                    start_date: start,
                    end_date: end,
                    notes,
                    price,
                    responsible,
                })
                .await?;
            Ok(format!("booked {}\n{}", r.id, render_reservation(engine.catalog(), &r, engine.today())))
        }
        DeskCommand::Edit {
            id,
            guest,
            room_type,
            start,
            end,
            phone,
            notes,
            price,
            clear_price,
            responsible,
        } => {
            let patch = ReservationPatch {
                guest_name: guest,
                phone,
                room_type,
                start_date: start,
                end_date: end,
                notes,
                price: if clear_price { Some(None) } else { price.map(Some) },
                responsible,
                on_clipboard: None,
            };
            if patch.is_empty() {
                return Err(DeskError::Usage("nothing to change".into()));
            }
            let r = engine.update_reservation(&ReservationId::from(id), patch).await?;
            Ok(format!("updated {}\n{}", r.id, render_reservation(engine.catalog(), &r, engine.today())))
        }
        DeskCommand::Cancel { id, yes } => {
            let id = ReservationId::from(id);
            let r = engine.get_reservation(&id).await?;
            if !yes {
                return Err(DeskError::Usage(format!(
                    "cancel {} ({}, {})? re-run with --yes to confirm",
                    id,
                    r.guest_name,
                    display_day(r.start_date)
                )));
            }
            match engine.cancel_reservation(&id).await? {
                CancelOutcome::Synced(r) => Ok(format!("cancelled {} ({})", r.id, r.guest_name)),
                CancelOutcome::OutOfSync(r, e) => Ok(format!(
                    "cancelled {} ({}) locally, but the server still has it: {e}\nWARNING: out of sync, it will reappear on the next reload",
                    r.id, r.guest_name
                )),
            }
        }
        DeskCommand::Clip { id } => {
            let id = ReservationId::from(id);
            let on = engine.toggle_clipboard(&id).await?;
            Ok(format!("{id} {}", if on { "added to clipboard" } else { "removed from clipboard" }))
        }
        DeskCommand::History { id } => {
            let id = ReservationId::from(id);
            let entries = engine.audit_trail(&id).await?;
            Ok(render_history(&id, &entries))
        }
        DeskCommand::Rooms => Ok(render_rooms(engine.catalog())),
    }
}

// ── Rendering ────────────────────────────────────────────────────

pub fn render_availability(snapshot: &AvailabilitySnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Availability on {}", display_day(snapshot.day));
    for category in &snapshot.categories {
        let t = &category.tally;
        let _ = writeln!(
            out,
            "\n{} - {}/{} free ({}%, {})",
            category.category,
            t.available,
            t.total,
            t.percentage(),
            t.band().as_str()
        );
        for room in &category.rooms {
            let _ = writeln!(
                out,
                "  {:<28} {:>3}/{:<3} free  {:>3} occupied  {:>4}%  {}",
                room.room_type.name,
                room.available,
                room.room_type.total,
                room.occupied,
                room.percentage,
                room.band.as_str()
            );
        }
    }
    let o = &snapshot.overall;
    let _ = writeln!(
        out,
        "\nTotal - {}/{} free ({}%), {} occupied ({}% occupancy)",
        o.available,
        o.total,
        o.percentage(),
        o.occupied(),
        o.occupancy_percentage()
    );
    out
}

/// One listing line. Arrivals today are marked with `>`, clipboard entries with `*`.
pub fn render_reservation(catalog: &Catalog, r: &Reservation, today: NaiveDate) -> String {
    let marker = if r.is_arrival(today) { '>' } else { ' ' };
    let clip = if r.on_clipboard { '*' } else { ' ' };
    let price = r.price.map_or_else(|| "-".to_string(), |p| p.brl());
    let mut line = format!(
        "{marker}{clip} {}  {:<24} {:<24} {} -> {} ({}n)  {}",
        r.id,
        r.guest_name,
        catalog.display_name(&r.room_type),
        display_day(r.start_date),
        display_day(r.end_date),
        r.stay().nights(),
        price
    );
    if let Some(phone) = &r.phone {
        let _ = write!(line, "  tel {phone}");
    }
    if let Some(who) = &r.responsible {
        let _ = write!(line, "  by {who}");
    }
    if let Some(notes) = &r.notes {
        let _ = write!(line, "\n      {notes}");
    }
    line
}

pub fn render_listing(catalog: &Catalog, listing: &Listing, include_history: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Current and upcoming ({})", listing.current.len());
    if listing.current.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for r in &listing.current {
        let _ = writeln!(out, "{}", render_reservation(catalog, r, listing.today));
    }
    if include_history {
        let _ = writeln!(out, "\nHistory ({})", listing.history.len());
        for r in &listing.history {
            let _ = writeln!(out, "{}", render_reservation(catalog, r, listing.today));
        }
    }
    out
}

pub fn render_history(id: &ReservationId, entries: &[AuditEntry]) -> String {
    if entries.is_empty() {
        return format!("no recorded changes for {id}\n");
    }
    let mut out = format!("Changes to {id}\n");
    for e in entries {
        let _ = write!(
            out,
            "  {}  {:<8} by {}",
            e.timestamp.format("%d/%m/%Y %H:%M"),
            e.action.as_str(),
            e.actor.as_deref().unwrap_or("unknown")
        );
        if let Some(fields) = e.changed_fields.as_ref().filter(|f| !f.is_empty()) {
            let _ = write!(out, " ({})", fields.join(", "));
        }
        out.push('\n');
    }
    out
}

pub fn render_rooms(catalog: &Catalog) -> String {
    let mut out = String::new();
    for category in catalog.list_categories() {
        let _ = writeln!(out, "{category}");
        for room in catalog.rooms_in_category(category) {
            let _ = writeln!(out, "  {:<24} {:<28} {:>3}", room.id, room.name, room.total);
        }
    }
    out
}

// ── Interactive console ──────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: DeskCommand,
}

/// Split a console line into arguments. Single or double quotes group words;
/// inside double quotes `\"` and `\\` are escapes.
pub fn split_line(line: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                in_arg = true;
                let quote = c;
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some('\\') if quote == '"' => match chars.next() {
                            Some(esc) => current.push(esc),
                            None => return Err("unterminated quote".into()),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err("unterminated quote".into()),
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            c => {
                in_arg = true;
                current.push(c);
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}

fn describe_event(catalog: &Catalog, event: &StoreEvent) -> Option<String> {
    match event {
        StoreEvent::RolledBack { id, room_type, mutation } => Some(format!(
            "! {} of {id} ({}) was not saved and has been undone",
            mutation.as_str(),
            catalog.display_name(room_type)
        )),
        StoreEvent::Diverged { id, room_type } => Some(format!(
            "! {id} ({}) is cancelled here but still exists on the server",
            catalog.display_name(room_type)
        )),
        _ => None,
    }
}

/// Read commands line by line until `quit` or end of input. Rollback and
/// divergence notices are printed after the command that caused them.
pub async fn run_console<R, W>(engine: &Engine, session: &Session, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut events = engine.notify.subscribe(Topic::All);
    let mut lines = input.lines();
    output
        .write_all(format!("signed in as {}. type 'help' for commands.\n", session.display_name).as_bytes())
        .await?;
    loop {
        output.write_all(b"roomdesk> ").await?;
        output.flush().await?;
        let Some(line) = lines.next_line().await? else { break };
        let line = line.trim();
        let reply = match line {
            "" => continue,
            "quit" | "exit" => break,
            "whoami" => format!("{}\n", session.display_name),
            "help" => {
                "commands: availability, list, add, edit, cancel, clip, history, rooms, whoami, quit\n".to_string()
            }
            _ => match split_line(line) {
                Err(e) => format!("error: {e}\n"),
                Ok(args) => match ConsoleLine::try_parse_from(args) {
                    Err(e) => e.render().to_string(),
                    Ok(parsed) => match execute(engine, parsed.command).await {
                        Ok(text) => ensure_newline(text),
                        Err(e) => format!("error: {e}\n"),
                    },
                },
            },
        };
        output.write_all(reply.as_bytes()).await?;

        loop {
            match events.try_recv() {
                Ok(event) => {
                    if let Some(notice) = describe_event(engine.catalog(), &event) {
                        output.write_all(format!("{notice}\n").as_bytes()).await?;
                    }
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
    output.flush().await
}

fn ensure_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
