// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod cid;
pub mod entity;
pub mod forward;
pub mod list;
pub mod summary;
