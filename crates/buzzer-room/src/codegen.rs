//! Room code generation.

use buzzer_protocol::RoomCode;
use rand::Rng;

/// Produces candidate room codes.
///
/// The generator doesn't need to know which codes are live: the
/// [`RoomStore`](crate::RoomStore) checks each candidate and asks again on
/// a collision.
pub trait CodeGenerator: Send + Sync + 'static {
    fn generate(&self) -> RoomCode;
}

impl<G: CodeGenerator + ?Sized> CodeGenerator for Box<G> {
    fn generate(&self) -> RoomCode {
        (**self).generate()
    }
}

/// Uniformly random 4-digit codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> RoomCode {
        let n = rand::rng().random_range(0..RoomCode::SPACE);
        RoomCode::from_number(n)
    }
}
