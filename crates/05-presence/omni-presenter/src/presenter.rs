//! Presenter: the state machine plus the media-specific behavior dispatched
//! through an enum of kinds, so each media family (video, audio, animation,
//! composite, control) gets its own tick logic behind one shared state
//! machine rather than a class hierarchy.

use omni_action::{Action, ActionFlags, CompositeStrategy};
use omni_buffer::{Chunk, ChunkFlags};

use crate::sink::{AudioSink, DisplaySink, NullAudioSink, NullDisplaySink, NullSceneGraphSink, SceneGraphSink};
use crate::state::{PresenterState, TickleState};

/// How many milliseconds the last frame/silence is held once looping is exhausted.
const DEFAULT_FREEZE_HOLD_MS: i64 = 0;

/// The media-specific behavior a presenter dispatches through, one variant
/// per specialization named in the state machine's table.
pub enum PresenterKind {
    /// FLIC/Smacker/still-image output: decodes one frame per tick and blits it.
    Video {
        /// Output surface.
        sink: Box<dyn DisplaySink + Send>,
        /// Z-order used when blitting.
        display_z: i32,
        /// Frames successfully presented, for diagnostics.
        frames_presented: u32,
    },
    /// Wave/MIDI output: fills an output buffer from each chunk's media bytes.
    Audio {
        /// Output device.
        sink: Box<dyn AudioSink + Send>,
    },
    /// Writes a scene-graph keyframe from each chunk's media bytes.
    Animation {
        /// Scene graph target.
        sink: Box<dyn SceneGraphSink + Send>,
    },
    /// Owns child presenters, pumped in the order the composite action's
    /// strategy dictates.
    Composite {
        /// How children are sequenced.
        strategy: CompositeStrategy,
        /// Child presenters, in registration order.
        children: Vec<Presenter>,
        /// Index of the child currently active under `Serial`/`Select`.
        active_child: usize,
    },
    /// Emits notifications as its chunks fire; produces no media output.
    Control,
}

impl PresenterKind {
    /// Builds a headless `Video` kind for tests/demos.
    pub fn null_video(display_z: i32) -> PresenterKind {
        PresenterKind::Video {
            sink: Box::new(NullDisplaySink::default()),
            display_z,
            frames_presented: 0,
        }
    }

    /// Builds a headless `Audio` kind for tests/demos.
    pub fn null_audio() -> PresenterKind {
        PresenterKind::Audio {
            sink: Box::new(NullAudioSink::default()),
        }
    }

    /// Builds a headless `Animation` kind for tests/demos.
    pub fn null_animation() -> PresenterKind {
        PresenterKind::Animation {
            sink: Box::new(NullSceneGraphSink::default()),
        }
    }
}

/// A single node of the presentation tree: the shared state machine plus a
/// media-specific [`PresenterKind`] and the action it was constructed from.
pub struct Presenter {
    state: PresenterState,
    kind: PresenterKind,
    action: Action,
    remaining_loops: Option<i32>,
    hold_started_at: i64,
    freeze_hold_ms: i64,
    /// Set when `tickle` transitions into `Streaming` from `Repeating`;
    /// the stream controller observes this and seeks the provider back to
    /// the action's start before the next chunk is delivered.
    rewind_requested: bool,
}

impl Presenter {
    /// Builds a presenter over `action`, in `Idle`.
    pub fn new(action: Action, kind: PresenterKind) -> Presenter {
        // `loop_count` counts total playbacks, and the first playback happens
        // on the way through `Streaming` before `Repeating` is ever reached,
        // so only `loop_count - 1` further rewinds are owed here.
        let remaining_loops = if action.flags.contains(ActionFlags::LOOPING) {
            if action.loop_count == 0 {
                None
            } else {
                Some(action.loop_count - 1)
            }
        } else {
            Some(0)
        };
        Presenter {
            state: PresenterState::new(),
            kind,
            action,
            remaining_loops,
            hold_started_at: 0,
            freeze_hold_ms: DEFAULT_FREEZE_HOLD_MS,
            rewind_requested: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> TickleState {
        self.state.current()
    }

    /// Whether `s` is the current state or was passed through previously.
    pub fn has_state_passed(&self, s: TickleState) -> bool {
        self.state.has_passed(s)
    }

    /// The action this presenter was constructed from.
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// `(object_id, sub_id)` this presenter's chunks are expected to arrive under.
    pub fn channel(&self) -> (u32, u16) {
        (self.action.object_id, 0)
    }

    /// `Idle -> Ready`: clears history and parses the action's extra
    /// key/value options.
    pub fn start(&mut self) -> std::collections::BTreeMap<String, String> {
        self.state.reset();
        self.state.advance(TickleState::Ready);
        self.action.parse_extra()
    }

    /// Forces a transition directly to `Done`, as `EndAction()` can from any state.
    pub fn end_action(&mut self) {
        self.state.advance(TickleState::Done);
    }

    /// Whether a rewind was requested on the most recent `tickle` call. The
    /// flag is cleared by this read.
    pub fn take_rewind_request(&mut self) -> bool {
        std::mem::replace(&mut self.rewind_requested, false)
    }

    /// Advances the state machine by one scheduler period, consuming
    /// `chunk` if one is due. Returns the state after advancing.
    pub fn tickle(&mut self, chunk: Option<&Chunk>, now_ms: i64) -> TickleState {
        if !self.action.flags.contains(ActionFlags::ENABLED) {
            return self.state.current();
        }

        match self.state.current() {
            TickleState::Idle => {}
            TickleState::Ready => {
                if chunk.is_some() {
                    self.state.advance(TickleState::Starting);
                    self.initialize_resources();
                }
            }
            TickleState::Starting => {
                self.state.advance(TickleState::Streaming);
            }
            TickleState::Streaming => {
                if let Some(c) = chunk {
                    self.present_chunk(c);
                    if c.flags().contains(ChunkFlags::END_OF_STREAM) {
                        self.state.advance(TickleState::Repeating);
                    }
                }
            }
            TickleState::Repeating => match self.remaining_loops {
                None => {
                    self.rewind_requested = true;
                    self.state.advance(TickleState::Streaming);
                }
                Some(n) if n > 0 => {
                    self.remaining_loops = Some(n - 1);
                    self.rewind_requested = true;
                    self.state.advance(TickleState::Streaming);
                }
                Some(_) => {
                    self.hold_started_at = now_ms;
                    self.state.advance(TickleState::Freezing);
                }
            },
            TickleState::Freezing => {
                if now_ms.saturating_sub(self.hold_started_at) >= self.freeze_hold_ms {
                    self.state.advance(TickleState::Done);
                }
            }
            TickleState::Done => {}
        }
        self.state.current()
    }

    fn initialize_resources(&mut self) {
        if let PresenterKind::Audio { sink } = &mut self.kind {
            sink.play();
        }
    }

    fn present_chunk(&mut self, chunk: &Chunk) {
        match &mut self.kind {
            PresenterKind::Video {
                sink,
                display_z,
                frames_presented,
            } => {
                chunk.with_media(|bytes| sink.blit(bytes, self.action.location.x, self.action.location.y, *display_z));
                sink.flip();
                *frames_presented += 1;
            }
            PresenterKind::Audio { sink } => {
                chunk.with_media(|bytes| {
                    sink.write(bytes);
                });
            }
            PresenterKind::Animation { sink } => {
                chunk.with_media(|bytes| sink.write_keyframe(self.action.object_id, bytes));
            }
            PresenterKind::Composite { children, .. } => {
                for child in children {
                    child.tickle(Some(chunk), 0);
                }
            }
            PresenterKind::Control => {}
        }
    }

    /// Hit-test for UI input routing. Defaults to `false`; only `Video`
    /// presenters with a known frame size participate.
    pub fn is_hit(&self, _x: f32, _y: f32) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omni_action::{Action, ActionBody, ActionKind, ActionVendorState, Vec3};
    use omni_buffer::{append_chunk, Buffer};

    fn sample_action(loop_count: i32, looping: bool) -> Action {
        let mut flags = ActionFlags::ENABLED;
        if looping {
            flags = ActionFlags::from_bits(flags.bits() | ActionFlags::LOOPING.bits());
        }
        Action {
            kind: ActionKind::Anim,
            source_name: "movie.omni".into(),
            object_name: "intro".into(),
            object_id: 7,
            atom: None,
            flags,
            start_time: 0,
            duration: 1000,
            loop_count,
            location: Vec3::default(),
            direction: Vec3::default(),
            up: Vec3::default(),
            size_on_disk: 0,
            vendor: ActionVendorState::default(),
            extra_data: Vec::new(),
            body: ActionBody::Leaf,
        }
    }

    #[test]
    fn state_monotonically_advances_through_a_single_chunk() {
        let action = sample_action(0, false);
        let mut presenter = Presenter::new(action, PresenterKind::null_animation());
        presenter.start();
        assert_eq!(presenter.state(), TickleState::Ready);

        let buf = Buffer::from_owned(Vec::new());
        append_chunk(&buf, 7, 0, 0, ChunkFlags::END_OF_STREAM, b"frame").unwrap();
        let chunk = Chunk::read(&buf, 0).unwrap();

        assert_eq!(presenter.tickle(Some(&chunk), 0), TickleState::Starting);
        assert_eq!(presenter.tickle(Some(&chunk), 0), TickleState::Streaming);
        assert_eq!(presenter.tickle(Some(&chunk), 0), TickleState::Repeating);
        // loop_count=0, Looping not set => remaining_loops=Some(0) => freeze then done.
        assert_eq!(presenter.tickle(None, 0), TickleState::Freezing);
        assert_eq!(presenter.tickle(None, 0), TickleState::Done);

        assert!(presenter.has_state_passed(TickleState::Idle));
        assert!(presenter.has_state_passed(TickleState::Streaming));
    }

    #[test]
    fn looping_action_rewinds_until_exhausted() {
        // loop_count=3 means 3 total playbacks: the initial pass plus two rewinds.
        let action = sample_action(3, true);
        let mut presenter = Presenter::new(action, PresenterKind::null_animation());
        presenter.start();

        let buf = Buffer::from_owned(Vec::new());
        append_chunk(&buf, 7, 0, 0, ChunkFlags::END_OF_STREAM, b"frame").unwrap();
        let chunk = Chunk::read(&buf, 0).unwrap();

        presenter.tickle(Some(&chunk), 0); // Ready -> Starting
        presenter.tickle(Some(&chunk), 0); // Starting -> Streaming
        presenter.tickle(Some(&chunk), 0); // Streaming -> Repeating (EndOfStream), playback 1 done
        assert_eq!(presenter.tickle(None, 0), TickleState::Streaming);
        assert!(presenter.take_rewind_request());

        presenter.tickle(Some(&chunk), 0); // Streaming -> Repeating again, playback 2 done
        assert_eq!(presenter.tickle(None, 0), TickleState::Streaming);
        assert!(presenter.take_rewind_request());

        presenter.tickle(Some(&chunk), 0); // Streaming -> Repeating, playback 3 done, loops exhausted now
        assert_eq!(presenter.tickle(None, 0), TickleState::Freezing);
    }

    #[test]
    fn end_action_forces_done_from_any_state() {
        let action = sample_action(0, false);
        let mut presenter = Presenter::new(action, PresenterKind::null_animation());
        presenter.start();
        presenter.end_action();
        assert_eq!(presenter.state(), TickleState::Done);
    }

    #[test]
    fn is_hit_defaults_to_false() {
        let action = sample_action(0, false);
        let presenter = Presenter::new(action, PresenterKind::null_video(0));
        assert!(!presenter.is_hit(10.0, 10.0));
    }
}
