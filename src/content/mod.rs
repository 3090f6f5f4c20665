/**
 * Content Module
 * Domain logic shared by the blog routes: sanitization, slug assignment,
 * and the publication lifecycle.
 */

pub mod publish;
pub mod sanitize;
pub mod slug;
