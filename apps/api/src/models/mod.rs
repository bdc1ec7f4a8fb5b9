pub mod lender;
pub mod loan_application;
pub mod status;
