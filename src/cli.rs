use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chime")]
#[command(about = concat!(
    "   _.-^-._\n",
    "  /  ___  \\     chime\n",
    " |  /   \\  |    reminders that ring until you answer\n",
    " |__\\___/__|\n",
    "     (_)"
))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = concat!(
    "v",
    env!("CARGO_PKG_VERSION"),
    "\nCodeName: ",
    env!("CODENAME")
))]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colors
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive reminder shell (default)
    Run {
        /// Never play sounds
        #[arg(long)]
        no_sound: bool,
        /// Never show desktop notifications
        #[arg(long)]
        no_notify: bool,
    },

    /// Play a tone pattern and exit
    Play {
        /// Pattern name (see `chime patterns`)
        pattern: String,
        /// Loop the pattern for this many seconds instead of playing it once
        #[arg(long, value_name = "SECS")]
        loop_secs: Option<u64>,
    },

    /// List the available tone patterns
    Patterns,

    /// Show the configuration file path and effective settings
    Config,
}

/// A line typed into the interactive shell
#[derive(Parser, Debug)]
#[command(name = "chime", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Subcommand, Debug)]
pub enum ShellCommand {
    /// Set a reminder for a task
    Remind {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
        /// Ring this many minutes from now
        #[arg(long = "in", value_name = "MIN", allow_negative_numbers = true, conflicts_with = "on")]
        in_minutes: Option<i64>,
        /// Ring on this date ("tomorrow", "friday", "25/01/2026")
        #[arg(long, value_name = "DATE")]
        on: Option<String>,
        /// Time of day for --on ("9am", "14:30"); start of day when omitted
        #[arg(long, value_name = "TIME", requires = "on")]
        at: Option<String>,
        /// Suggested re-notify minutes when the alarm rings
        #[arg(long, value_name = "MIN")]
        repeat: Option<u32>,
    },

    /// List pending alarms
    #[command(alias = "ls")]
    List,

    /// Cancel a pending alarm
    Cancel {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
        /// Due date, when several tasks share the name
        #[arg(long, value_name = "DATE")]
        due: Option<String>,
    },

    /// Move a pending alarm to MIN minutes from now
    Snooze {
        minutes: i64,
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
        /// Due date, when several tasks share the name
        #[arg(long, value_name = "DATE")]
        due: Option<String>,
    },

    /// Play a tone pattern
    Play { pattern: String },

    /// Stop all sound
    Stop,

    /// Leave the shell, discarding pending alarms
    #[command(alias = "exit")]
    Quit,
}
