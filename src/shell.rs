//! Interactive reminder shell
//!
//! This is the presentation side of an alarm: the scheduler's handler only
//! forwards fired alarms onto the shell's event channel, and the shell
//! (running on the main thread) rings, notifies, and asks the user whether
//! to re-notify or cancel.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use chrono::{DateTime, Duration, Local};
use clap::Parser;
use notify_rust::Notification;
use tracing::{debug, warn};

use chime_core::date::parse_date;
use chime_core::{CoreError, TaskRef, TonePattern};
use chime_engine::{AlarmScheduler, FiredAlarm, LoopHandle, PendingAlarm, ToneSequencer};

use crate::cli::{ShellCommand, ShellLine};
use crate::config::Config;
use crate::display::{format_alarm_prompt, format_pending, format_summary};
use crate::error::{CliError, Result};

/// Longest `remind --in` offset (one year); `--on` reaches further
const MAX_REMIND_MINUTES: i64 = 366 * 24 * 60;

pub enum Event {
    Line(String),
    Alarm(FiredAlarm),
    InputClosed,
}

/// What the user answered to a ringing alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmAnswer {
    Dismiss,
    Snooze(u32),
    Cancel,
}

/// Parse an answer to the ringing prompt
///
/// Empty input takes the alarm's suggested repeat, or dismisses when there
/// is none. A number of minutes may be 0, which re-notifies right away.
pub fn parse_answer(input: &str, repeat_minutes: u32, max_minutes: u32) -> Result<AlarmAnswer> {
    match input.trim().to_lowercase().as_str() {
        "" if repeat_minutes > 0 => Ok(AlarmAnswer::Snooze(repeat_minutes)),
        "" | "d" | "dismiss" | "ok" => Ok(AlarmAnswer::Dismiss),
        "c" | "cancel" => Ok(AlarmAnswer::Cancel),
        other => {
            let minutes: i64 = other
                .parse()
                .map_err(|_| CliError::parse(format!("'{}' is not a number of minutes", other)))?;
            let minutes = CoreError::check_range("MINUTES", minutes, 0, i64::from(max_minutes))?;
            Ok(AlarmAnswer::Snooze(minutes as u32))
        }
    }
}

/// Fire instant and suggested repeat for `remind --in <MIN>`
///
/// Non-positive minutes ring now. Without `--repeat` the offset doubles as
/// the suggested repeat.
pub fn remind_in(
    now: DateTime<Local>,
    minutes: i64,
    repeat: Option<u32>,
) -> Result<(DateTime<Local>, u32)> {
    let minutes = CoreError::check_range("MIN", minutes.max(0), 0, MAX_REMIND_MINUTES)?;
    let fire_at = now
        .checked_add_signed(Duration::minutes(minutes))
        .ok_or_else(|| CliError::validation("MIN", format!("{} minutes from now is out of range", minutes)))?;
    // Bounded by MAX_REMIND_MINUTES
    Ok((fire_at, repeat.unwrap_or(minutes as u32)))
}

/// Result of handling one shell line
enum Flow {
    Continue,
    Quit,
}

pub struct Shell {
    config: Config,
    scheduler: AlarmScheduler,
    sequencer: Option<ToneSequencer>,
    notify: bool,
    use_color: bool,
    events: Receiver<Event>,
    ringing: VecDeque<FiredAlarm>,
    bell: Option<LoopHandle>,
}

impl Shell {
    pub fn new(
        config: Config,
        sequencer: Option<ToneSequencer>,
        notify: bool,
        use_color: bool,
    ) -> Result<Self> {
        let (tx, events) = mpsc::channel();

        let alarm_tx = tx.clone();
        let scheduler = AlarmScheduler::new(
            &config.engine.alarm,
            move |_: &AlarmScheduler, alarm: FiredAlarm| {
                if alarm_tx.send(Event::Alarm(alarm)).is_err() {
                    warn!("alarm fired after the shell closed");
                }
            },
        )?;

        spawn_stdin_reader(tx)?;

        Ok(Self {
            config,
            scheduler,
            sequencer,
            notify,
            use_color,
            events,
            ringing: VecDeque::new(),
            bell: None,
        })
    }

    pub fn run(mut self) -> Result<()> {
        println!("Type 'help' for commands. Alarms are kept only while the shell runs.");
        self.prompt();

        while let Ok(event) = self.events.recv() {
            match event {
                Event::Alarm(alarm) => {
                    self.ringing.push_back(alarm);
                    if self.ringing.len() == 1 {
                        self.ring_front();
                    }
                }
                Event::Line(line) => {
                    if self.ringing.is_empty() {
                        match self.handle_line(&line) {
                            Ok(Flow::Quit) => break,
                            Ok(Flow::Continue) => {}
                            Err(e) => println!("{}", e),
                        }
                        self.prompt();
                    } else {
                        self.answer_front(&line);
                    }
                }
                Event::InputClosed => break,
            }
        }

        self.silence();
        let dropped = self.scheduler.cancel_all();
        if dropped > 0 {
            println!("Discarded {} pending alarm(s).", dropped);
        }
        Ok(())
    }

    fn prompt(&self) {
        print!("chime> ");
        // A failed flush only loses the prompt text
        let _ = io::stdout().flush();
    }

    fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        let args = shlex::split(line).ok_or_else(|| CliError::parse("Invalid quoting"))?;
        let parsed = match ShellLine::try_parse_from(args) {
            Ok(parsed) => parsed,
            Err(e) => {
                // clap renders help and usage errors itself
                print!("{}", e.render());
                return Ok(Flow::Continue);
            }
        };

        match parsed.command {
            ShellCommand::Remind {
                name,
                in_minutes,
                on,
                at,
                repeat,
            } => self.remind(&name.join(" "), in_minutes, on, at, repeat)?,
            ShellCommand::List => self.list(),
            ShellCommand::Cancel { name, due } => {
                let task = self.find_pending(&name.join(" "), due.as_deref())?;
                self.scheduler.cancel(&task);
                println!("Cancelled alarm: {}", task);
            }
            ShellCommand::Snooze { minutes, name, due } => {
                let max = i64::from(self.config.engine.alarm.max_snooze_minutes);
                let minutes = CoreError::check_range("MINUTES", minutes, 0, max)?;
                let task = self.find_pending(&name.join(" "), due.as_deref())?;
                self.scheduler.schedule_relative(task.clone(), minutes);
                println!("Re-notify {} in {}m", task, minutes);
            }
            ShellCommand::Play { pattern } => {
                let pattern: TonePattern = pattern.parse()?;
                match &self.sequencer {
                    Some(sequencer) => {
                        sequencer.play_once(pattern);
                    }
                    None => println!("Sound is disabled."),
                }
            }
            ShellCommand::Stop => self.silence(),
            ShellCommand::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    fn remind(
        &self,
        name: &str,
        in_minutes: Option<i64>,
        on: Option<String>,
        at: Option<String>,
        repeat: Option<u32>,
    ) -> Result<()> {
        let today = Local::now().date_naive();

        let fire_at = match (in_minutes, on) {
            (Some(minutes), _) => {
                let (fire_at, repeat) = remind_in(Local::now(), minutes, repeat)?;
                self.scheduler.schedule(TaskRef::new(name, today), fire_at, repeat);
                fire_at
            }
            (None, Some(date)) => {
                let date = parse_date(&date)?;
                let repeat = repeat.unwrap_or(self.config.engine.alarm.default_repeat_minutes);
                self.scheduler.schedule_at_daily_time(
                    TaskRef::new(name, date),
                    date,
                    at.as_deref(),
                    repeat,
                )?
            }
            (None, None) => {
                return Err(CliError::validation(
                    "remind",
                    "one of --in <MIN> or --on <DATE> must be provided",
                ));
            }
        };

        println!("Reminder set: {} at {}", name, fire_at.format("%d/%m/%Y %H:%M"));
        if let Some(sequencer) = &self.sequencer {
            sequencer.play_once(TonePattern::Success);
        }
        Ok(())
    }

    fn list(&self) {
        let pending = self.scheduler.pending();
        if pending.is_empty() {
            println!("No pending alarms.");
            return;
        }
        let now = Local::now();
        for alarm in &pending {
            println!("  {}", format_pending(alarm, now, self.use_color));
        }
        println!("{}", format_summary(pending.len(), self.use_color));
    }

    fn find_pending(&self, name: &str, due: Option<&str>) -> Result<TaskRef> {
        let due = due.map(parse_date).transpose()?;
        let matches: Vec<PendingAlarm> = self
            .scheduler
            .pending()
            .into_iter()
            .filter(|alarm| alarm.task.matches_name(name))
            .filter(|alarm| due.is_none_or(|d| alarm.task.due() == d))
            .collect();

        match matches.as_slice() {
            [] => Err(CliError::AlarmNotFound(name.to_string())),
            [only] => Ok(only.task.clone()),
            several => {
                let dues: Vec<_> = several
                    .iter()
                    .map(|a| a.task.due().format("%d/%m/%Y").to_string())
                    .collect();
                Err(CliError::validation(
                    "name",
                    format!("'{}' matches several tasks, add --due ({})", name, dues.join(", ")),
                ))
            }
        }
    }

    /// Start ringing for the alarm at the front of the queue
    fn ring_front(&mut self) {
        let Some(alarm) = self.ringing.front() else {
            return;
        };

        if self.notify {
            let shown = Notification::new()
                .summary("Chime")
                .body(&format!("Reminder: {}", alarm.task))
                .show();
            if let Err(e) = shown {
                debug!("desktop notification failed: {}", e);
            }
        }

        if let Some(sequencer) = &self.sequencer {
            self.bell = Some(sequencer.start_loop(self.config.engine.audio.alarm_pattern));
        }

        let choices = self.config.engine.alarm.snooze_choices();
        println!("{}", format_alarm_prompt(alarm, &choices, self.use_color));
        print!("> ");
        let _ = io::stdout().flush();
    }

    fn answer_front(&mut self, line: &str) {
        let Some(alarm) = self.ringing.front() else {
            return;
        };

        let max = self.config.engine.alarm.max_snooze_minutes;
        let answer = match parse_answer(line, alarm.repeat_minutes, max) {
            Ok(answer) => answer,
            Err(e) => {
                println!("{}", e);
                print!("> ");
                let _ = io::stdout().flush();
                return;
            }
        };

        // Silence first so the bell never outlives the answer
        self.silence();
        let Some(alarm) = self.ringing.pop_front() else {
            return;
        };

        match answer {
            AlarmAnswer::Snooze(minutes) => {
                self.scheduler.schedule_relative(alarm.task.clone(), i64::from(minutes));
                println!("Re-notify {} in {}m", alarm.task, minutes);
            }
            AlarmAnswer::Cancel => {
                self.scheduler.cancel(&alarm.task);
                println!("Alarm cancelled: {}", alarm.task);
            }
            AlarmAnswer::Dismiss => println!("Dismissed: {}", alarm.task),
        }

        if self.ringing.is_empty() {
            self.prompt();
        } else {
            self.ring_front();
        }
    }

    fn silence(&mut self) {
        if let Some(bell) = self.bell.take() {
            bell.cancel();
        }
        if let Some(sequencer) = &self.sequencer {
            sequencer.stop_all();
        }
    }
}

fn spawn_stdin_reader(tx: Sender<Event>) -> Result<()> {
    thread::Builder::new()
        .name("chime-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(Event::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("failed to read input: {}", e);
                        break;
                    }
                }
            }
            let _ = tx.send(Event::InputClosed);
        })
        .map_err(|e| CliError::io("failed to spawn input thread", e))?;
    Ok(())
}
