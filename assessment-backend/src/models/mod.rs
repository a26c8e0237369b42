pub mod question;
pub mod session_answer;
pub mod test_session;
