//! Row-oriented output for the CLI commands.
//!
//! Commands hand every record over as a (table row, serializable record)
//! pair; only the representation the selected format needs is computed.
//! Headers are fixed per command, so they are part of sink construction
//! rather than a separate call that csv would need to order correctly.

use csv_core::WriteResult;
use std::path::PathBuf;

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Format {
    Table,
    Jsonl,
    Csv,
}

#[derive(clap::Parser, Clone)]
#[group(id = "output::Args")]
pub struct Args {
    /// Write to this file instead of standard output.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    #[arg(long, short = 'f', value_enum, default_value_t = Format::Table)]
    format: Format,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not open the output file at {1:?}")]
    OpenOutputFile(#[source] std::io::Error, PathBuf),
    #[error("could not write to the output file at {1:?}")]
    WriteFile(#[source] std::io::Error, PathBuf),
    #[error("could not write to the terminal")]
    WriteStdout(#[source] std::io::Error),
    #[error("could not serialize a record to JSON")]
    SerializeJson(#[source] serde_json::Error),
}

enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    fn open(&self) -> Result<Box<dyn std::io::Write>, Error> {
        Ok(match self {
            Self::Stdout => Box::new(std::io::stdout().lock()),
            Self::File(path) => {
                let file = std::fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)
                    .map_err(|e| Error::OpenOutputFile(e, path.clone()))?;
                Box::new(file)
            }
        })
    }

    fn wrap(&self, e: std::io::Error) -> Error {
        match self {
            Self::Stdout => Error::WriteStdout(e),
            Self::File(path) => Error::WriteFile(e, path.clone()),
        }
    }
}

enum Renderer {
    /// Rows accumulate in the comfy table and render on commit.
    Table(comfy_table::Table),
    /// One serde record per line, written through immediately.
    Jsonl,
    /// Header row written at construction, records written through.
    Csv,
}

pub struct Output {
    destination: Destination,
    io: Box<dyn std::io::Write>,
    renderer: Renderer,
}

impl Args {
    pub fn to_output(self, headers: &'static [&'static str]) -> Result<Output, Error> {
        let destination = match self.output {
            None => Destination::Stdout,
            Some(path) => Destination::File(path),
        };
        let mut io = destination.open()?;
        let renderer = match self.format {
            Format::Table => {
                let mut table = comfy_table::Table::new();
                table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
                table.set_header(headers.to_vec());
                Renderer::Table(table)
            }
            Format::Jsonl => Renderer::Jsonl,
            Format::Csv => {
                write_csv_row(&mut io, headers.iter().copied())
                    .map_err(|e| destination.wrap(e))?;
                Renderer::Csv
            }
        };
        Ok(Output { destination, io, renderer })
    }
}

fn write_csv_row<'v>(
    io: &mut dyn std::io::Write,
    values: impl Iterator<Item = &'v str> + Clone,
) -> Result<(), std::io::Error> {
    // Worst case every byte gets escaped, plus the surrounding quotes.
    let largest = values.clone().map(str::len).max().unwrap_or(0);
    let mut buffer = vec![0; 2 + 2 * largest];
    let mut writer = csv_core::Writer::new();
    for (position, value) in values.enumerate() {
        if position != 0 {
            let (WriteResult::InputEmpty, written) = writer.delimiter(&mut buffer) else {
                unreachable!("csv delimiter exceeded the sized buffer");
            };
            io.write_all(&buffer[..written])?;
        }
        let (WriteResult::InputEmpty, consumed, written) =
            writer.field(value.as_bytes(), &mut buffer)
        else {
            unreachable!("csv field exceeded the sized buffer");
        };
        debug_assert_eq!(consumed, value.len());
        io.write_all(&buffer[..written])?;
    }
    let (WriteResult::InputEmpty, written) = writer.terminator(&mut buffer) else {
        unreachable!("csv terminator exceeded the sized buffer");
    };
    io.write_all(&buffer[..written])
}

impl Output {
    pub fn record<R: serde::Serialize>(
        &mut self,
        table_row: impl FnOnce() -> Vec<String>,
        serde_record: impl FnOnce() -> R,
    ) -> Result<(), Error> {
        match &mut self.renderer {
            Renderer::Table(table) => {
                table.add_row(table_row());
            }
            Renderer::Jsonl => {
                serde_json::to_writer(&mut self.io, &serde_record())
                    .map_err(Error::SerializeJson)?;
                writeln!(self.io).map_err(|e| self.destination.wrap(e))?;
            }
            Renderer::Csv => {
                let values = table_row();
                write_csv_row(&mut self.io, values.iter().map(String::as_str))
                    .map_err(|e| self.destination.wrap(e))?;
            }
        }
        Ok(())
    }

    pub fn commit(mut self) -> Result<(), Error> {
        if let Renderer::Table(table) = &self.renderer {
            self.io
                .write_fmt(format_args!("{table}\n"))
                .map_err(|e| self.destination.wrap(e))?;
        }
        self.io.flush().map_err(|e| self.destination.wrap(e))
    }
}
