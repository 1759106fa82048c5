//! Line commands
//!
//! One command per line, whitespace separated. Optional positional
//! arguments can be skipped with `-` (e.g. `update-stop - 28500`).

use crate::error::CommandError;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use tame_core::Side;
use tame_order_manager::Direction;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Chase {
        side: Side,
        quantity: Decimal,
        decay: Option<Duration>,
    },
    CancelChase,
    Stop {
        price: Decimal,
        quantity: Option<Decimal>,
        side: Option<Side>,
    },
    UpdateStop {
        quantity: Option<Decimal>,
        price: Option<Decimal>,
    },
    MoveStop {
        price: Decimal,
    },
    Range {
        side: Side,
        start: Decimal,
        end: Decimal,
        num_orders: usize,
        capital: Decimal,
        risk_pct: Decimal,
        stop: Decimal,
        take_profit: Decimal,
        threshold: Option<Decimal>,
    },
    Bracket {
        side: Side,
        entry: Decimal,
        stop: Decimal,
        take_profit: Decimal,
        capital: Decimal,
        risk_pct: Decimal,
        threshold: Option<Decimal>,
    },
    Cancel {
        direction: Direction,
        from: Option<usize>,
        to: Option<usize>,
    },
    Bump {
        delta: Decimal,
    },
    Market {
        symbol: String,
    },
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  market <symbol>                         select the market to trade
  chase <buy|sell> <qty> [decay_secs]     chase the top of book
  cancel-chase                            stop the running chase
  stop <price> [qty] [buy|sell]           place a protective stop
  update-stop [qty] [price]               replace the stop (use - to keep a value)
  move-stop <price>                       move the stop, keeping its quantity
  range <buy|sell> <start> <end> <n> <capital> <risk%> <stop> <tp> [threshold]
  bracket <buy|sell> <entry> <stop> <tp> <capital> <risk%> [threshold]
  cancel <top|bottom> [from] [to]         cancel resting limits, 1-indexed
  bump <delta>                            shift every resting order
  status                                  position, stop and chase state
  quit";

impl Command {
    /// Parse one input line; blank lines and `#` comments yield `None`
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let mut args = Args::new(words.collect());

        let command = match verb.to_ascii_lowercase().as_str() {
            "chase" => {
                let name = "chase";
                Command::Chase {
                    side: args.required(name, "side")?,
                    quantity: args.required(name, "qty")?,
                    decay: args
                        .optional::<u64>(name, "decay_secs")?
                        .map(Duration::from_secs),
                }
            }
            "cancel-chase" => Command::CancelChase,
            "stop" => {
                let name = "stop";
                Command::Stop {
                    price: args.required(name, "price")?,
                    quantity: args.optional(name, "qty")?,
                    side: args.optional(name, "side")?,
                }
            }
            "update-stop" => {
                let name = "update-stop";
                Command::UpdateStop {
                    quantity: args.optional(name, "qty")?,
                    price: args.optional(name, "price")?,
                }
            }
            "move-stop" => Command::MoveStop {
                price: args.required("move-stop", "price")?,
            },
            "range" => {
                let name = "range";
                Command::Range {
                    side: args.required(name, "side")?,
                    start: args.required(name, "start")?,
                    end: args.required(name, "end")?,
                    num_orders: args.required(name, "n")?,
                    capital: args.required(name, "capital")?,
                    risk_pct: args.required(name, "risk%")?,
                    stop: args.required(name, "stop")?,
                    take_profit: args.required(name, "tp")?,
                    threshold: args.optional(name, "threshold")?,
                }
            }
            "bracket" => {
                let name = "bracket";
                Command::Bracket {
                    side: args.required(name, "side")?,
                    entry: args.required(name, "entry")?,
                    stop: args.required(name, "stop")?,
                    take_profit: args.required(name, "tp")?,
                    capital: args.required(name, "capital")?,
                    risk_pct: args.required(name, "risk%")?,
                    threshold: args.optional(name, "threshold")?,
                }
            }
            "cancel" => {
                let name = "cancel";
                Command::Cancel {
                    direction: args.required(name, "top|bottom")?,
                    from: args.optional(name, "from")?,
                    to: args.optional(name, "to")?,
                }
            }
            "bump" => Command::Bump {
                delta: args.required("bump", "delta")?,
            },
            "market" => Command::Market {
                symbol: args.required("market", "symbol")?,
            },
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };

        args.finish(command.name())?;
        Ok(Some(command))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Chase { .. } => "chase",
            Command::CancelChase => "cancel-chase",
            Command::Stop { .. } => "stop",
            Command::UpdateStop { .. } => "update-stop",
            Command::MoveStop { .. } => "move-stop",
            Command::Range { .. } => "range",
            Command::Bracket { .. } => "bracket",
            Command::Cancel { .. } => "cancel",
            Command::Bump { .. } => "bump",
            Command::Market { .. } => "market",
            Command::Status => "status",
            Command::Help => "help",
            Command::Quit => "quit",
        }
    }
}

struct Args<'a> {
    words: std::vec::IntoIter<&'a str>,
}

impl<'a> Args<'a> {
    fn new(words: Vec<&'a str>) -> Self {
        Self {
            words: words.into_iter(),
        }
    }

    fn required<T: FromStr>(
        &mut self,
        command: &'static str,
        argument: &'static str,
    ) -> Result<T, CommandError> {
        match self.optional(command, argument)? {
            Some(value) => Ok(value),
            None => Err(CommandError::MissingArgument { command, argument }),
        }
    }

    fn optional<T: FromStr>(
        &mut self,
        command: &'static str,
        argument: &'static str,
    ) -> Result<Option<T>, CommandError> {
        match self.words.next() {
            None | Some("-") => Ok(None),
            Some(word) => word
                .parse()
                .map(Some)
                .map_err(|_| CommandError::InvalidArgument {
                    command,
                    argument,
                    value: word.to_string(),
                }),
        }
    }

    fn finish(mut self, command: &'static str) -> Result<(), CommandError> {
        match self.words.next() {
            Some(_) => Err(CommandError::TooManyArguments(command)),
            None => Ok(()),
        }
    }
}
