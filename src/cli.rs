use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "setrunner", version, about = "Run gym workouts set by set")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Emit machine-readable JSON instead of colorful text.
    #[arg(global = true, long)]
    pub json: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Session-scoped commands
    #[command(subcommand, visible_alias = "s")]
    Session(SessionCmd),

    /// Workout templates
    #[command(subcommand, visible_alias = "t")]
    Template(TemplateCmd),

    /// View or edit setrunner config
    #[command(subcommand)]
    Config(ConfigCmd),
}

//
// Commands
//

#[derive(Subcommand)]
pub enum SessionCmd {
    /// Start a session from a template
    #[command(visible_alias = "s")]
    Start {
        /// Template name (file stem under templates/)
        template: String,
    },

    /// Show the current session
    #[command(visible_alias = "i")]
    Show,

    /// Complete the set under the cursor - Usage: session done REPS WEIGHT
    #[command(visible_alias = "d")]
    #[command(override_usage = "session done <REPS> <WEIGHT>")]
    Done {
        #[command(flatten)]
        set: SetArgs,

        /// Don't wait out the rest countdown
        #[arg(long)]
        no_rest: bool,
    },

    /// Mark the set under the cursor as failed
    #[command(visible_alias = "f")]
    Fail {
        #[command(flatten)]
        set: SetArgs,
    },

    /// Move to the next set (skips a pending rest)
    #[command(visible_alias = "n")]
    Next,

    /// Move to the previous set
    #[command(visible_alias = "p")]
    Prev,

    /// Jump to an exercise
    #[command(visible_alias = "j")]
    Jump {
        /// 1-based exercise index
        exercise: usize,
    },

    /// Skip an exercise
    Skip {
        /// 1-based exercise index
        exercise: usize,
    },

    /// Count down the timed set under the cursor
    Timer,

    /// Continue the pending rest countdown - Usage: session rest [--adjust SECS | --skip]
    #[command(visible_alias = "r")]
    Rest {
        /// Add (or with a minus sign, take off) seconds before continuing
        #[arg(long, short = 'a', allow_negative_numbers = true, value_name = "SECS")]
        adjust: Option<i64>,

        /// End the rest now and move to the next set
        #[arg(long, conflicts_with = "adjust")]
        skip: bool,
    },

    /// Pause the session
    Pause,

    /// Resume a paused session
    Resume,

    /// Finish the session
    #[command(alias = "end")]
    Finish,

    /// Abandon the session
    Abandon,

    /// Set the session note
    #[command(override_usage = "session note <NOTE_STRING>")]
    Note {
        #[arg(value_name = "NOTE_STRING")]
        note: String,
    },

    /// Attach a personal record set elsewhere - Usage: session pr EXERCISE WEIGHT REPS
    Pr {
        /// 1-based exercise index
        exercise: usize,
        weight: f64,
        reps: u32,
    },

    /// List past sessions
    #[command(visible_alias = "l")]
    Log {
        /// Show at most this many sessions
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Args)]
pub struct SetArgs {
    /// Reps performed (defaults to the target)
    #[arg(value_name = "REPS")]
    pub reps: Option<u32>,

    /// Weight in kg (use "bw" for bodyweight)
    #[arg(value_name = "WEIGHT")]
    pub weight: Option<String>,

    /// Rate of perceived exertion, 1-10
    #[arg(long, short = 'r')]
    pub rpe: Option<f64>,

    /// Seconds, for timed sets
    #[arg(long, short = 'd')]
    pub duration: Option<u32>,

    /// Free-form note for the set
    #[arg(long, short = 'n')]
    pub note: Option<String>,
}

#[derive(Subcommand)]
pub enum TemplateCmd {
    /// List templates
    #[command(visible_alias = "l")]
    List,

    /// Show a template in detail
    #[command(visible_alias = "s")]
    Show { template: String },
}

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Show all config keys
    List,

    /// Get the value of a key
    Get { key: String },

    /// Set or override a key
    Set { key: String, val: String },

    /// Remove a key
    Unset { key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(args: &[&str]) -> SessionCmd {
        let argv = ["setrunner", "session"].iter().chain(args);
        match Cli::try_parse_from(argv).unwrap().cmd {
            Commands::Session(cmd) => cmd,
            _ => panic!("expected a session command"),
        }
    }

    #[test]
    fn finish_answers_to_end() {
        assert!(matches!(session(&["finish"]), SessionCmd::Finish));
        assert!(matches!(session(&["end"]), SessionCmd::Finish));
    }

    #[test]
    fn rest_takes_negative_adjustments_or_skip() {
        assert!(matches!(
            session(&["rest", "--adjust", "-30"]),
            SessionCmd::Rest { adjust: Some(-30), skip: false }
        ));
        assert!(matches!(
            session(&["rest", "--skip"]),
            SessionCmd::Rest { adjust: None, skip: true }
        ));
        assert!(matches!(session(&["rest"]), SessionCmd::Rest { adjust: None, skip: false }));

        let both = ["setrunner", "session", "rest", "--skip", "--adjust", "10"];
        assert!(Cli::try_parse_from(both).is_err());
    }
}
