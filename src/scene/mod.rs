//! Scene persistence.
//!
//! Scene files are block structured text:
//!
//! ```text
//! SCENE town {
//!     OBJECT hero player 3 4 0;
//!     OBJECT box prop 0 0 0 {
//!         OBJECT lid prop.lid 0 0 1;
//!     };
//!     SCENE houses.scn 10 0 0;
//!     TILEMAP ground.json 0 0 0;
//! }
//! ```
//!
//! - `parser` turns text into statements without touching the registry
//! - `manager` instantiates statements, tracks loaded files and saves scenes
//! - `writer` renders a scene subtree back to text
//! - `tilemap` reads JSON tile lists referenced by `TILEMAP`

pub mod manager;
pub mod parser;
pub mod tilemap;
pub mod writer;

pub use manager::{LoadedScene, SceneManager};
pub use parser::{SceneDocument, parse_scene};
pub use writer::write_scene;
