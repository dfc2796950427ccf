//! The design-chat orchestration core. Per user turn the classifier picks
//! one of five actions, the dispatcher routes to the chat or image endpoint,
//! and every image-path failure degrades to a plain text reply so the user
//! always gets a message back.

pub mod chat_client;
pub mod classifier;
pub mod dispatcher;
pub mod image_client;
pub mod pixels;
pub mod resolver;

pub use classifier::{AgentAction, AgentDecision};
pub use dispatcher::AgentReply;

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::error::{AppError, AppResult};

    use super::chat_client::{ChatCompleter, CompleteFuture, CompletionRequest};
    use super::image_client::{ImageBackend, ImageFuture, ImageOptions};

    /// Scripted chat endpoint. Pops one reply per call; an exhausted script
    /// keeps answering with a canned line.
    pub struct FakeChat {
        replies: Mutex<VecDeque<Result<String, String>>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl FakeChat {
        pub fn replies(replies: Vec<Result<String, String>>) -> Self {
            FakeChat {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn always(text: &str) -> Self {
            Self::replies(vec![Ok(text.to_string())])
        }
    }

    impl ChatCompleter for FakeChat {
        fn complete(&self, request: CompletionRequest) -> CompleteFuture<'_> {
            self.requests.lock().unwrap().push(request);
            let next = self.replies.lock().unwrap().pop_front();
            Box::pin(async move {
                match next {
                    Some(Ok(text)) => Ok(text),
                    Some(Err(e)) => Err(AppError::Upstream(e)),
                    None => Ok("(scripted reply)".to_string()),
                }
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum ImageCall {
        Generate { prompt: String },
        Edit { prompt: String, image_count: usize },
    }

    /// Image endpoint fake: either always succeeds with fixed bytes or
    /// always fails. Records every call for assertions.
    pub struct FakeImages {
        result: AppResult<Vec<u8>>,
        pub calls: Mutex<Vec<ImageCall>>,
    }

    impl FakeImages {
        pub fn ok(bytes: Vec<u8>) -> Self {
            FakeImages {
                result: Ok(bytes),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            FakeImages {
                result: Err(AppError::Upstream(message.to_string())),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn next(&self) -> AppResult<Vec<u8>> {
            match &self.result {
                Ok(bytes) => Ok(bytes.clone()),
                Err(AppError::Upstream(m)) => Err(AppError::Upstream(m.clone())),
                Err(_) => Err(AppError::Internal("unexpected fake error".into())),
            }
        }
    }

    impl ImageBackend for FakeImages {
        fn generate(&self, prompt: String, _options: ImageOptions) -> ImageFuture<'_> {
            self.calls.lock().unwrap().push(ImageCall::Generate { prompt });
            let result = self.next();
            Box::pin(async move { result })
        }

        fn edit(&self, prompt: String, images: Vec<Vec<u8>>, _options: ImageOptions) -> ImageFuture<'_> {
            self.calls.lock().unwrap().push(ImageCall::Edit {
                prompt,
                image_count: images.len(),
            });
            let result = self.next();
            Box::pin(async move { result })
        }
    }
}
