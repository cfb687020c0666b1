use std::{
    fmt::Display,
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum, ValueHint};
use strum::Display;

/// Report destination and format, shared by commands that render findings.
#[derive(Args, Debug, Clone)]
pub struct OutputArgs<Format: ValueEnum + Clone + Default + Display + Send + Sync + 'static> {
    /// Output format
    #[arg(long = "output", value_enum, default_value_t, value_name = "FORMAT")]
    pub format: Format,

    /// Write the report to this file instead of stdout (required for
    /// json/csv)
    #[arg(long = "output-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub output_file: Option<PathBuf>,
}

impl<Format: ValueEnum + Clone + Default + Display + Send + Sync + 'static> OutputArgs<Format> {
    pub fn has_output_file(&self) -> bool {
        self.output_file.is_some()
    }

    /// Open the report writer: the output file when given, stdout otherwise.
    pub fn get_writer(&self) -> Result<Box<dyn Write>> {
        match &self.output_file {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                Ok(Box::new(BufWriter::new(file)))
            }
            None => Ok(Box::new(std::io::stdout().lock())),
        }
    }
}

/// Report output formats
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, ValueEnum, Default)]
#[strum(serialize_all = "kebab-case")]
pub enum ReportOutputFormat {
    #[default]
    Human,
    Json,
    Csv,
}

impl ReportOutputFormat {
    /// json and csv reports go to a file so that CI pipelines never have to
    /// untangle report bytes from log lines.
    pub fn require_output_file(&self, args: &OutputArgs<Self>) -> Result<()> {
        if matches!(self, ReportOutputFormat::Json | ReportOutputFormat::Csv)
            && !args.has_output_file()
        {
            bail!("--output-file is required for {self} output");
        }
        Ok(())
    }
}
