//! Service layer of the hackathon platform.
//! - Each area is a `*Management` over a shared [`context::ManagementContext`].
//! - Storage is reached through typed tables from the `models` crate.
//! - Hot reads go through [`cache::CacheProvider`].
//!
//! ```
//! use service::app::Managements;
//! use service::hackathon::HackathonRequest;
//!
//! tokio_test::block_on(async {
//!     let m = Managements::in_memory();
//!     let request = HackathonRequest { name: "demo".into(), ..Default::default() };
//!     let hackathon = m.hackathons.create_hackathon(&request, "alice").await.unwrap();
//!     assert!(m.admins.is_hackathon_admin(hackathon.name(), "alice").await.unwrap());
//! });
//! ```

pub mod activity_log;
pub mod announcement;
pub mod app;
pub mod award;
pub mod cache;
pub mod context;
pub mod cron;
pub mod enrollment;
pub mod errors;
pub mod experiment;
pub mod github;
pub mod hackathon;
pub mod hackathon_admin;
pub mod judge;
pub mod kubernetes;
pub mod organizer;
pub mod pagination;
pub mod questionnaire;
pub mod rating;
pub mod storage;
pub mod team;
pub mod template_repo;
pub mod user;
