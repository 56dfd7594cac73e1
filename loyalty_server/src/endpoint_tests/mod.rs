mod auth;
mod balance;
mod helpers;
mod orders;
