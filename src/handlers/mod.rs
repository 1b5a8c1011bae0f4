// Handlers grouped by how a request is authenticated:
// public (none), protected (platform JWT) and dynamic (API key, plus a
// collection token where the schema asks for one).

pub mod dynamic;
pub mod protected;
pub mod public;
