//! Line-oriented command shell over an [`Engine`].
//!
//! Every command error is reported on the shell's output and the shell
//! keeps reading; only `quit`/`exit` or end of input stop it.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use framesim_catalog::Catalog;
use framesim_runtime::value::DisplayRecord;
use framesim_runtime::{Engine, RunReport};
use tracing::{info, warn};

use crate::error::ShellError;
use crate::scene::load_scene;
use crate::settings::{KEYS, Settings};
use crate::view::Plot;

/// Rows drawn by the plot.
const PLOT_LINES: usize = 12;

/// Whether the shell should keep reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

type Handler = fn(&mut Shell, &[&str]) -> Result<Flow, ShellError>;

struct Command {
    names: &'static [&'static str],
    args: usize,
    usage: &'static str,
    handler: Handler,
}

const COMMANDS: &[Command] = &[
    Command {
        names: &["load", "l"],
        args: 1,
        usage: "load <scene.yaml>  replace the loaded scene",
        handler: Shell::cmd_load,
    },
    Command {
        names: &["run", "r"],
        args: 1,
        usage: "run <frames>       run frames and report fps",
        handler: Shell::cmd_run,
    },
    Command {
        names: &["cfg"],
        args: 0,
        usage: "cfg                show all settings",
        handler: Shell::cmd_cfg,
    },
    Command {
        names: &["get"],
        args: 1,
        usage: "get <key>          show one setting",
        handler: Shell::cmd_get,
    },
    Command {
        names: &["set"],
        args: 2,
        usage: "set <key> <value>  change and save a setting",
        handler: Shell::cmd_set,
    },
    Command {
        names: &["print", "p"],
        args: 0,
        usage: "print              show records routed in the last frame",
        handler: Shell::cmd_print,
    },
    Command {
        names: &["help"],
        args: 0,
        usage: "help               list commands",
        handler: Shell::cmd_help,
    },
    Command {
        names: &["quit", "exit"],
        args: 0,
        usage: "quit               leave the shell",
        handler: Shell::cmd_quit,
    },
];

fn all_command_names() -> String {
    let mut names: Vec<&str> = COMMANDS.iter().flat_map(|c| c.names.iter().copied()).collect();
    names.sort_unstable();
    names.join(", ")
}

pub struct Shell {
    engine: Engine,
    settings: Settings,
    settings_path: PathBuf,
    plot: Plot,
    out: Box<dyn Write + Send>,
    last_report: Option<RunReport>,
}

impl Shell {
    pub fn new(
        engine: Engine,
        settings: Settings,
        settings_path: PathBuf,
        out: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            engine,
            settings,
            settings_path,
            plot: Plot::new(),
            out,
            last_report: None,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    /// Execute one command line. Blank lines do nothing.
    pub fn execute(&mut self, line: &str) -> Result<Flow, ShellError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = words.split_first() else {
            return Ok(Flow::Continue);
        };
        let command = COMMANDS
            .iter()
            .find(|c| c.names.contains(&name))
            .ok_or_else(|| ShellError::UnknownCommand(all_command_names()))?;
        if args.len() != command.args {
            return Err(ShellError::ArgCount {
                command: name.to_string(),
                expected: command.args,
                found: args.len(),
            });
        }
        (command.handler)(self, args)
    }

    /// Read commands until `quit` or end of input.
    pub fn repl(&mut self, input: impl BufRead) -> Result<(), ShellError> {
        let mut lines = input.lines();
        loop {
            write!(self.out, ">>> ")?;
            self.out.flush()?;
            let Some(line) = lines.next() else {
                writeln!(self.out)?;
                return Ok(());
            };
            match self.execute(&line?) {
                Ok(Flow::Quit) => return Ok(()),
                Ok(Flow::Continue) => {}
                Err(e) => {
                    warn!(error = %e, "command failed");
                    writeln!(self.out, "{e}")?;
                }
            }
        }
    }

    fn cmd_load(&mut self, args: &[&str]) -> Result<Flow, ShellError> {
        let path = PathBuf::from(args[0]);
        let scene = load_scene(&path)?;
        self.engine.load(&scene, &Catalog)?;
        self.plot = Plot::new();
        self.last_report = None;
        let (statics, _) = self.engine.model_count();
        info!(scene = %path.display(), models = statics, "scene loaded");
        writeln!(self.out, "loaded {} ({statics} models)", path.display())?;
        Ok(Flow::Continue)
    }

    /// `run <frames>`. With `drawrate` R > 0 the frames run in chunks of R
    /// and the plot is drawn after each full chunk.
    fn cmd_run(&mut self, args: &[&str]) -> Result<Flow, ShellError> {
        let frames: u64 = args[0].parse().map_err(|e: std::num::ParseIntError| {
            ShellError::BadArgument {
                arg: args[0].to_string(),
                reason: e.to_string(),
            }
        })?;

        let rate = self.settings.drawrate;
        let report = if rate == 0 {
            self.engine.run(frames)?
        } else {
            // Draw after every full chunk, the last one included, so a run
            // of exactly `rate` frames still draws once. A partial trailing
            // chunk runs undrawn.
            let mut total = RunReport {
                frames: 0,
                elapsed: Default::default(),
                fps: 0.0,
            };
            let mut left = frames;
            while left > 0 {
                let chunk = left.min(rate);
                let report = self.engine.run(chunk)?;
                total.frames += report.frames;
                total.elapsed += report.elapsed;
                left -= chunk;
                if chunk == rate {
                    self.draw(&report)?;
                }
            }
            let secs = total.elapsed.as_secs_f64();
            total.fps = if secs > 0.0 { total.frames as f64 / secs } else { 0.0 };
            total
        };

        writeln!(
            self.out,
            "ran {} frames in {:.3}s, fps: {:.1}",
            report.frames,
            report.elapsed.as_secs_f64(),
            report.fps
        )?;
        self.last_report = Some(report);
        Ok(Flow::Continue)
    }

    fn draw(&mut self, report: &RunReport) -> Result<(), ShellError> {
        let root = self.engine.topic_records("root");
        self.plot.add_records(&root);
        let rate = report.fps * self.settings.dt / 1000.0;
        writeln!(self.out, "fps: {:.1} rate: {:.2}", report.fps, rate)?;
        let picture = self.plot.render(PLOT_LINES);
        write!(self.out, "{picture}")?;
        Ok(())
    }

    fn cmd_cfg(&mut self, _: &[&str]) -> Result<Flow, ShellError> {
        for key in KEYS {
            let value = self.settings.get(key)?;
            writeln!(self.out, "{key}: {value}")?;
        }
        Ok(Flow::Continue)
    }

    fn cmd_get(&mut self, args: &[&str]) -> Result<Flow, ShellError> {
        let value = self.settings.get(args[0])?;
        writeln!(self.out, "{}: {value}", args[0])?;
        Ok(Flow::Continue)
    }

    fn cmd_set(&mut self, args: &[&str]) -> Result<Flow, ShellError> {
        let mut next = self.settings.clone();
        next.set(args[0], args[1])?;
        next.apply(&mut self.engine)?;
        next.save(&self.settings_path)?;
        self.settings = next;
        writeln!(self.out, "{}: {}", args[0], self.settings.get(args[0])?)?;
        Ok(Flow::Continue)
    }

    fn cmd_print(&mut self, _: &[&str]) -> Result<Flow, ShellError> {
        for (topic, records) in self.engine.routed() {
            writeln!(self.out, "{topic}:")?;
            for record in &records {
                writeln!(self.out, "\t{}", DisplayRecord(record))?;
            }
        }
        Ok(Flow::Continue)
    }

    fn cmd_help(&mut self, _: &[&str]) -> Result<Flow, ShellError> {
        for command in COMMANDS {
            writeln!(self.out, "  {}", command.usage)?;
        }
        Ok(Flow::Continue)
    }

    fn cmd_quit(&mut self, _: &[&str]) -> Result<Flow, ShellError> {
        Ok(Flow::Quit)
    }
}
