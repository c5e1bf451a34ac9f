//! The concrete record formats.
//!
//! | Format   | Marker       | Tag           | Line grammar                     |
//! |----------|--------------|---------------|----------------------------------|
//! | Intel    | [`Intel`]    | [`IntelTag`]  | `:CCAAAATT[DD...]SS`             |
//! | Motorola | [`Motorola`] | [`MotorolaTag`] | `Stcc[aaaa..][dd...]ss`        |
//! | MOS      | [`Mos`]      | `()`          | `;CCAAAA[DD...]SSSS`             |
//! | Binary   | [`Binary`]   | `()`          | raw bytes                        |

pub mod binary;
pub mod intel;
pub mod mos;
pub mod motorola;

pub use binary::Binary;
pub use intel::{Intel, IntelFraming, IntelTag};
pub use mos::Mos;
pub use motorola::{Motorola, MotorolaFraming, MotorolaTag};
