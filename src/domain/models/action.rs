use super::RecognitionRequest;

#[derive(Debug)]
pub enum Action {
    JobCancel(),
    JobSubmit(RecognitionRequest),
}
