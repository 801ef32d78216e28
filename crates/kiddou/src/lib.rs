#![doc = include_str!("../../../README.md")]
#![expect(clippy::float_cmp, reason = "zero and NaN checks require exact float comparison")]
#![expect(clippy::unnecessary_wraps, reason = "dispatch signatures are uniform")]

mod ast;
mod check;
mod env;
mod error;
mod interp;
mod io;
mod parse;
mod pervasives;
mod run;
mod scan;
mod value;

pub use crate::{
    error::{ErrorHandler, ExcKind, KiddouError},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    run::Kiddou,
};
