//! Integration tests: the equity engine and the responder driven
//! end to end against in-memory doubles.

mod equity_flow;
mod mock_inbox;
mod responder_cycle;
mod scripted_calculator;
