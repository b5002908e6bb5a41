//! Text decoration for assistant replies.
//!
//! [`decorate`] turns the small inline-markup subset chat services emit
//! (emphasis and code) into a [`RichText`] of styled [`Span`]s. It is applied
//! to Assistant turns at display time only; spoken output and user turns use
//! the raw text.

pub mod markup;
pub mod rich;

pub use markup::decorate;
pub use rich::{CodeStyle, RichText, Span, Style};
