// SPDX-License-Identifier: MIT
//
// weft-term — the terminal layer of weft.
//
// Everything between "the application drew some cells" and "bytes on the
// wire", plus everything between "bytes arrived on stdin" and "typed
// event":
//
//   Grid ──▶ DiffEngine ──▶ Encoder ──▶ stdout
//   stdin ──▶ InputReader ──▶ Decoder ──▶ Event
//
// The grid is double-buffered and the renderer only touches changed
// cells. The encoder tracks the terminal's cursor and pen so it never
// repeats an escape the terminal already has. The decoder is a true
// incremental state machine: escape sequences may arrive split across any
// number of reads.
//
// No external TUI framework is involved. Terminal control goes straight
// through ANSI escape sequences and raw termios.

pub mod ansi;
pub mod cell;
pub mod color;
pub mod diff;
pub mod encode;
pub mod grid;
pub mod input;
pub mod reader;
pub mod terminal;
