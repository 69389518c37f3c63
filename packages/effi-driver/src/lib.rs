// Effi driver - browser-automation surface and spreadsheet decoding
//
// This crate is the narrow interface between the export service and the
// third-party Effi web application. It provides:
// - A `BrowserSession` trait with the primitives an extraction workflow
//   needs (navigate, fill, click, wait, await-download), plus a WebDriver
//   implementation backed by fantoccini.
// - A `GuideDecoder` trait that turns a downloaded spreadsheet into
//   schema-less records, implemented with calamine.
//
// The service core only depends on the traits; concrete adapters are wired
// at startup.

pub mod decoder;
pub mod surface;
pub mod webdriver;

pub use decoder::{GuideDecoder, XlsxGuideDecoder};
pub use surface::{BrowserLauncher, BrowserSession, DownloadedFile, Selector, Selectors};
pub use webdriver::WebDriverLauncher;
