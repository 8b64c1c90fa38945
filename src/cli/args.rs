use crate::types::money::Currency;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay group transactions and report balances or settlements
#[derive(Parser, Debug)]
#[command(name = "group-ledger")]
#[command(about = "Replay group transactions and report balances or settlements", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing transaction records
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Currency of the replayed group
    #[arg(
        long = "currency",
        value_name = "CURRENCY",
        default_value = "gbp",
        help = "Ledger currency: 'gbp', 'usd' or 'eur'"
    )]
    pub currency: CurrencyArg,

    /// Which report to write to stdout
    #[arg(
        long = "report",
        value_name = "REPORT",
        default_value = "balances",
        help = "Report to produce: 'balances' for final member balances or 'settlements' for the settle-up plan"
    )]
    pub report: ReportType,
}

/// Currency choices accepted on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CurrencyArg {
    Gbp,
    Usd,
    Eur,
}

impl From<CurrencyArg> for Currency {
    fn from(arg: CurrencyArg) -> Self {
        match arg {
            CurrencyArg::Gbp => Currency::Gbp,
            CurrencyArg::Usd => Currency::Usd,
            CurrencyArg::Eur => Currency::Eur,
        }
    }
}

/// Available replay reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportType {
    Balances,
    Settlements,
}
