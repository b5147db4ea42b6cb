use std::pin::Pin;

use anyhow::Result;
use clap::ValueEnum;
use tokio::io::{AsyncWrite, AsyncWriteExt as _};

/// Push formatted argument to the formatter
#[macro_export]
macro_rules! argf {
    ($rf:expr, $($arg:tt)*) => {
        $rf.push_arg(format!($($arg)*).as_bytes()).await?
    };
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum FormattingStyle {
    #[default]
    OneLine,
    MultiLine,
}

pub struct Formatter<'f> {
    style: FormattingStyle,
    output: Pin<&'f mut (dyn AsyncWrite + Send)>,
}

impl<'f> Formatter<'f> {
    pub fn new(output: Pin<&'f mut (dyn AsyncWrite + Send)>, style: FormattingStyle) -> Self {
        Formatter { style, output }
    }

    /// Starts a record: writes the CPU tag and the opening of the argument list.
    pub async fn push_record(mut self, cpu: u32, label: &str) -> Result<RecordFormatter<'f>> {
        let output = &mut self.output;

        output.write_all(format!("[cpu {cpu}]").as_bytes()).await?;

        match self.style {
            FormattingStyle::OneLine => output.write_all(b" ").await?,
            FormattingStyle::MultiLine => output.write_all(b"\n\t").await?,
        };

        output.write_all(label.as_bytes()).await?;
        output.write_all(b"(").await?;

        Ok(RecordFormatter {
            formatter: self,
            argc: 0,
        })
    }
}

pub struct RecordFormatter<'f> {
    formatter: Formatter<'f>,
    argc: usize,
}

const INDENT_STEP: &[u8] = &[b' '; 4];
impl<'f> RecordFormatter<'f> {
    pub async fn push_arg(&mut self, arg: &[u8]) -> Result<()> {
        let output = &mut self.formatter.output;

        if self.argc > 0 {
            output.write_all(b",").await?;
        }
        match self.formatter.style {
            FormattingStyle::OneLine => {
                if self.argc > 0 {
                    output.write_all(b" ").await?;
                }
                output.write_all(arg).await?;
            }
            FormattingStyle::MultiLine => {
                output.write_all(b"\n\t").await?;
                output.write_all(INDENT_STEP).await?;
                output.write_all(arg).await?;
            }
        }

        self.argc += 1;

        Ok(())
    }

    pub async fn finish(mut self) -> Result<Formatter<'f>> {
        let output = &mut self.formatter.output;

        if let FormattingStyle::MultiLine = self.formatter.style {
            output.write_all(b"\n\t").await?;
        }

        output.write_all(b")\n").await?;

        Ok(self.formatter)
    }
}
