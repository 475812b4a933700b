//! Human-readable face description from detector geometry.
//!
//! Purely informational: nothing downstream relies on the wording.

use crate::provider::FaceAnalysis;
use crate::types::{BoundingBox, Landmarks};

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Describe face proportions relative to the bounding box.
pub fn describe_geometry(face: &BoundingBox, landmarks: &Landmarks, faces_detected: usize) -> String {
    let [left_eye, right_eye, nose, left_mouth, right_mouth] = *landmarks;

    let face_ratio = face.height / face.width;
    let eye_face_ratio = distance(left_eye, right_eye) / face.width;
    let nose_y_pos = (nose.1 - face.y) / face.height;
    let mouth_face_ratio = distance(left_mouth, right_mouth) / face.width;

    format!(
        "Face dimensions: {face_ratio:.2} height/width ratio. \
         Eye spacing: {eye_face_ratio:.3} relative to face width. \
         Nose positioned at {nose_y_pos:.3} vertical face ratio. \
         Mouth width: {mouth_face_ratio:.3} relative to face width. \
         Landmark confidence: {faces_detected} face(s) detected."
    )
}

/// Describe an analysis, falling back to a short note when the provider
/// reported no box or landmarks.
pub fn describe(analysis: &FaceAnalysis) -> String {
    let landmarks = analysis
        .landmarks
        .or_else(|| analysis.face.as_ref().and_then(|f| f.landmarks));

    match (&analysis.face, landmarks) {
        (Some(face), Some(lms)) if face.width > 0.0 && face.height > 0.0 => {
            describe_geometry(face, &lms, analysis.faces_detected)
        }
        _ => format!(
            "Face detected ({} face(s) in image); no landmark geometry available.",
            analysis.faces_detected
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;

    fn face() -> BoundingBox {
        BoundingBox {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 130.0,
            confidence: 0.98,
            landmarks: None,
        }
    }

    const LANDMARKS: Landmarks = [
        (40.0, 60.0),
        (80.0, 60.0),
        (60.0, 85.0),
        (45.0, 110.0),
        (75.0, 110.0),
    ];

    #[test]
    fn test_describe_geometry_values() {
        let text = describe_geometry(&face(), &LANDMARKS, 1);
        assert!(text.contains("Face dimensions: 1.30 height/width ratio."), "{text}");
        assert!(text.contains("Eye spacing: 0.400 relative"), "{text}");
        assert!(text.contains("Nose positioned at 0.500 vertical"), "{text}");
        assert!(text.contains("Mouth width: 0.300 relative"), "{text}");
        assert!(text.ends_with("1 face(s) detected."), "{text}");
    }

    #[test]
    fn test_describe_uses_box_landmarks() {
        let mut f = face();
        f.landmarks = Some(LANDMARKS);
        let analysis = FaceAnalysis {
            embedding: Embedding::new(vec![1.0]),
            face: Some(f),
            landmarks: None,
            confidence: None,
            faces_detected: 2,
        };
        assert!(describe(&analysis).starts_with("Face dimensions"));
    }

    #[test]
    fn test_describe_without_geometry() {
        let analysis = FaceAnalysis {
            embedding: Embedding::new(vec![1.0]),
            face: None,
            landmarks: None,
            confidence: None,
            faces_detected: 1,
        };
        assert!(describe(&analysis).contains("no landmark geometry"));
    }
}
