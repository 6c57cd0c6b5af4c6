//! Capability traits a device/codec backend implements, consumed generically
//! by the presenter kinds. These traits and their `Null*` test doubles are
//! the seam real display/audio/scene backends plug into.

/// A video/still-image output surface.
pub trait DisplaySink {
    /// Blits a decoded frame at `(x, y)` with the given z-order.
    fn blit(&mut self, frame: &[u8], x: f32, y: f32, z: i32);

    /// Presents the accumulated surface.
    fn flip(&mut self);
}

/// An audio output device.
pub trait AudioSink {
    /// Writes samples to the device's buffer, returning how many were accepted.
    fn write(&mut self, samples: &[u8]) -> usize;

    /// Starts or resumes playback.
    fn play(&mut self);

    /// Pauses playback without discarding buffered samples.
    fn pause(&mut self);

    /// Stops playback and discards buffered samples.
    fn stop(&mut self);
}

/// A scene graph an animation presenter writes keyframes into.
pub trait SceneGraphSink {
    /// Writes a keyframe for `object_id`.
    fn write_keyframe(&mut self, object_id: u32, data: &[u8]);
}

/// A no-op [`DisplaySink`], used in tests and headless configurations.
#[derive(Default)]
pub struct NullDisplaySink {
    /// Number of times `blit` was called, for test assertions.
    pub blit_count: u32,
}

impl DisplaySink for NullDisplaySink {
    fn blit(&mut self, _frame: &[u8], _x: f32, _y: f32, _z: i32) {
        self.blit_count += 1;
    }

    fn flip(&mut self) {}
}

/// A no-op [`AudioSink`], used in tests and headless configurations.
#[derive(Default)]
pub struct NullAudioSink {
    /// Total bytes accepted by `write`, for test assertions.
    pub bytes_written: usize,
}

impl AudioSink for NullAudioSink {
    fn write(&mut self, samples: &[u8]) -> usize {
        self.bytes_written += samples.len();
        samples.len()
    }

    fn play(&mut self) {}
    fn pause(&mut self) {}
    fn stop(&mut self) {}
}

/// A no-op [`SceneGraphSink`], used in tests and headless configurations.
#[derive(Default)]
pub struct NullSceneGraphSink {
    /// Number of keyframes written, for test assertions.
    pub keyframe_count: u32,
}

impl SceneGraphSink for NullSceneGraphSink {
    fn write_keyframe(&mut self, _object_id: u32, _data: &[u8]) {
        self.keyframe_count += 1;
    }
}
