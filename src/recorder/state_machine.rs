use super::detector::Detection;

/// 录制状态：一旦进入 Capturing 就不会回到 Idle
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Capturing { captured: u64 },
}

impl CaptureState {
    pub fn new() -> Self {
        CaptureState::Idle
    }

    pub fn transition(&self, target_seen: bool) -> (CaptureState, GateAction) {
        match self {
            CaptureState::Idle => {
                if target_seen {
                    (CaptureState::Capturing { captured: 0 }, GateAction::StartCapture)
                } else {
                    (CaptureState::Idle, GateAction::Skip)
                }
            }
            CaptureState::Capturing { captured } => (
                CaptureState::Capturing {
                    captured: *captured,
                },
                GateAction::Capture,
            ),
        }
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, CaptureState::Capturing { .. })
    }
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateAction {
    Skip,
    StartCapture,
    Capture,
}

/// 首次看到目标类别后锁定为录制状态，录满 `required_frames` 帧结束
pub struct DetectionGate {
    state: CaptureState,
    target_label: String,
    required_frames: u64,
    frame_counter: u64,
}

impl DetectionGate {
    pub fn new(target_label: &str, required_frames: u64) -> Self {
        Self {
            state: CaptureState::new(),
            target_label: target_label.to_string(),
            required_frames,
            frame_counter: 0,
        }
    }

    pub fn contains_target(&self, detections: &[Detection]) -> bool {
        detections.iter().any(|d| d.label == self.target_label)
    }

    /// 返回当前帧是否需要录制
    pub fn observe(&mut self, detections: &[Detection]) -> bool {
        self.frame_counter += 1;

        let target_seen = !self.state.is_capturing() && self.contains_target(detections);
        let (new_state, action) = self.state.transition(target_seen);
        self.state = new_state;

        action != GateAction::Skip
    }

    /// 录制一帧，返回分配给它的序号（从 1 开始）
    pub fn record_capture(&mut self) -> Option<u64> {
        match &mut self.state {
            CaptureState::Capturing { captured } if *captured < self.required_frames => {
                *captured += 1;
                Some(*captured)
            }
            _ => None,
        }
    }

    pub fn captured(&self) -> u64 {
        match self.state {
            CaptureState::Idle => 0,
            CaptureState::Capturing { captured } => captured,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_capturing() && self.captured() >= self.required_frames
    }

    pub fn current_state(&self) -> &CaptureState {
        &self.state
    }

    pub fn required_frames(&self) -> u64 {
        self.required_frames
    }

    pub fn target_label(&self) -> &str {
        &self.target_label
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::detector::NormalizedRect;

    fn det(label: &str) -> Detection {
        Detection::new(label, 0.9, NormalizedRect::new(0.1, 0.1, 0.2, 0.2))
    }

    #[test]
    fn test_idle_until_target_seen() {
        let mut gate = DetectionGate::new("person", 10);

        assert!(!gate.observe(&[]));
        assert!(!gate.observe(&[det("dog"), det("car")]));
        assert_eq!(gate.current_state(), &CaptureState::Idle);

        assert!(gate.observe(&[det("dog"), det("person")]));
        assert!(matches!(
            gate.current_state(),
            CaptureState::Capturing { captured: 0 }
        ));
    }

    #[test]
    fn test_latch_is_sticky() {
        let mut gate = DetectionGate::new("person", 10);
        let batches: Vec<Vec<Detection>> = vec![
            vec![],
            vec![det("person")],
            vec![],
            vec![det("cat")],
            vec![],
            vec![det("person")],
        ];

        let results: Vec<bool> = batches.iter().map(|b| gate.observe(b)).collect();
        assert_eq!(results, vec![false, true, true, true, true, true]);
        assert_eq!(gate.frame_count(), 6);
    }

    #[test]
    fn test_record_capture_counts_to_target() {
        let mut gate = DetectionGate::new("person", 3);
        assert_eq!(gate.record_capture(), None);

        gate.observe(&[det("person")]);
        assert_eq!(gate.record_capture(), Some(1));
        assert_eq!(gate.record_capture(), Some(2));
        assert!(!gate.is_complete());
        assert_eq!(gate.record_capture(), Some(3));
        assert!(gate.is_complete());

        assert_eq!(gate.record_capture(), None);
        assert_eq!(gate.captured(), 3);
    }

    #[test]
    fn test_transition_table() {
        let idle = CaptureState::Idle;
        assert_eq!(idle.transition(false), (CaptureState::Idle, GateAction::Skip));
        assert_eq!(
            idle.transition(true),
            (CaptureState::Capturing { captured: 0 }, GateAction::StartCapture)
        );

        let capturing = CaptureState::Capturing { captured: 5 };
        assert_eq!(
            capturing.transition(false),
            (CaptureState::Capturing { captured: 5 }, GateAction::Capture)
        );
    }
}
